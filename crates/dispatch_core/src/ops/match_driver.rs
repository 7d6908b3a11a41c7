//! Matching entry point: resolve defaults and hand off to the engine.

use crate::domain::RideId;
use crate::error::DispatchResult;
use crate::matching::{self, MatchOutcome};

use super::Dispatch;

impl Dispatch {
    /// Find and assign a driver for a `searching` booking. `radius_km` and
    /// `max_attempts` default from configuration when not supplied.
    pub fn match_driver(
        &self,
        booking_id: RideId,
        radius_km: Option<f64>,
        max_attempts: Option<u32>,
    ) -> DispatchResult<MatchOutcome> {
        let config = &self.config().matching;
        matching::match_ride(
            self.store(),
            self.clock(),
            self.responder(),
            config,
            booking_id,
            radius_km.unwrap_or(config.search_radius_km),
            max_attempts.unwrap_or(config.max_attempts),
        )
    }
}
