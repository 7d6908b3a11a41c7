//! Driver heartbeat: location refresh and session keep-alive.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Actor, Availability, DriverSession, RideId, RideStatus, SessionId};
use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatRequest {
    pub position: Coordinates,
    pub heading: Option<f64>,
    pub battery_level: Option<f64>,
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatOutcome {
    pub session_id: SessionId,
    pub availability: Availability,
    pub active_booking_id: Option<RideId>,
}

impl Dispatch {
    /// Record a driver heartbeat: update the profile's location, refresh the
    /// open session or open a new one (flipping an `offline` driver back to
    /// `online`), and report the driver's active booking if any.
    pub fn driver_heartbeat(
        &self,
        caller: Option<Actor>,
        request: HeartbeatRequest,
    ) -> DispatchResult<HeartbeatOutcome> {
        let actor = self.require_caller(caller)?;
        let driver_id = match actor {
            Actor::Driver(id) => id,
            _ => {
                return Err(DispatchError::Unauthorized(
                    "heartbeats come from drivers only".to_string(),
                ))
            }
        };

        let now = self.clock().now();
        let applied = self.store().update_driver_where(driver_id, &|_| true, &|d| {
            d.location = Some(request.position);
            d.heading = request.heading;
            d.last_location_update = Some(now);
            d.updated_at = now;
        })?;
        if !applied {
            return Err(DispatchError::NotFound("driver"));
        }
        let profile = self
            .store()
            .driver(driver_id)?
            .ok_or(DispatchError::NotFound("driver"))?;

        let session_id = match self.store().open_session(driver_id)? {
            Some(session) => {
                self.store().update_session_where(
                    session.id,
                    &|s| s.is_open(),
                    &|s| {
                        s.last_heartbeat = now;
                        s.last_battery_level = request.battery_level;
                        if request.app_version.is_some() {
                            s.app_version = request.app_version.clone();
                        }
                    },
                )?;
                session.id
            }
            None => {
                // Driver just came online.
                let session = DriverSession {
                    id: Uuid::new_v4(),
                    driver_id,
                    started_at: now,
                    last_heartbeat: now,
                    ended_at: None,
                    end_reason: None,
                    start_location: request.position,
                    city_code: profile.city_code.clone(),
                    app_version: request.app_version.clone(),
                    last_battery_level: request.battery_level,
                };
                let session_id = session.id;
                self.store().insert_session(session)?;

                self.store().update_driver_where(
                    driver_id,
                    &|d| d.availability == Availability::Offline,
                    &|d| {
                        d.availability = Availability::Online;
                        d.updated_at = now;
                    },
                )?;
                session_id
            }
        };

        let active_booking_id = self
            .store()
            .rides_where(&|r| {
                r.driver_id == Some(driver_id)
                    && matches!(
                        r.status,
                        RideStatus::DriverAssigned
                            | RideStatus::DriverEnRoute
                            | RideStatus::DriverArrived
                            | RideStatus::TripStarted
                            | RideStatus::TripInProgress
                    )
            })?
            .first()
            .map(|r| r.id);

        let availability = self
            .store()
            .driver(driver_id)?
            .map(|d| d.availability)
            .unwrap_or(profile.availability);

        debug!(driver_id = %driver_id, ?availability, "heartbeat recorded");

        Ok(HeartbeatOutcome {
            session_id,
            availability,
            active_booking_id,
        })
    }
}
