//! Fare quotes: route the trip, read the active surge zone, price it.

use serde::Deserialize;

use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;
use crate::pricing::{self, FareBreakdown};
use crate::routing::fallback_route;
use crate::surge;

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateRequest {
    pub pickup: Coordinates,
    pub drop: Coordinates,
    pub ride_class: String,
    pub city_code: String,
}

impl Dispatch {
    /// Quote a fare for one ride class. Distance/duration come from the
    /// route provider, falling back to the straight-line estimate when it
    /// cannot answer; the surge multiplier is the city's active zone.
    pub fn estimate_fare(&self, request: EstimateRequest) -> DispatchResult<FareBreakdown> {
        let tariff = self
            .config()
            .tariffs
            .get(&request.ride_class)
            .ok_or_else(|| {
                DispatchError::PreconditionFailed(format!(
                    "unknown ride class '{}'",
                    request.ride_class
                ))
            })?;

        let route = self
            .routes()
            .route(request.pickup, request.drop)
            .unwrap_or_else(|| fallback_route(request.pickup, request.drop));

        let multiplier = surge::active_multiplier(self.store(), self.clock(), &request.city_code)?;

        Ok(pricing::estimate_fare(
            &request.ride_class,
            tariff,
            &self.config().tariffs.currency,
            &route,
            multiplier,
        ))
    }
}
