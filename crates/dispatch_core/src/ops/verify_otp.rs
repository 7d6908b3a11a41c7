//! Pickup verification: the assigned driver submits the rider's one-time
//! code to start the trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::domain::{Actor, Availability, RideEvent, RideEventType, RideId, RideStatus};
use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub booking_id: RideId,
    pub otp: String,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtpVerified {
    pub booking_id: RideId,
    pub new_status: RideStatus,
    pub trip_started_at: DateTime<Utc>,
}

impl Dispatch {
    /// Verify the rider's code. On a match the ride moves to `trip_started`
    /// and the driver to `on_trip`; on a mismatch nothing about the ride
    /// changes, but the failed attempt is logged.
    pub fn verify_otp(
        &self,
        caller: Option<Actor>,
        request: VerifyOtpRequest,
    ) -> DispatchResult<OtpVerified> {
        let actor = self.require_caller(caller)?;
        let ride = self.load_ride(request.booking_id)?;

        let driver_id = match actor {
            Actor::Driver(id) if ride.driver_id == Some(id) => id,
            _ => {
                return Err(DispatchError::Unauthorized(
                    "only the assigned driver may verify the code".to_string(),
                ))
            }
        };

        if ride.status != RideStatus::DriverArrived {
            return Err(DispatchError::PreconditionFailed(format!(
                "cannot verify code: booking status is '{}', expected 'driver_arrived'",
                ride.status
            )));
        }

        let location = request.location.or(Some(ride.pickup.position));

        if ride.otp != request.otp {
            self.store().append_event(RideEvent::record(
                ride.id,
                RideEventType::OtpVerified,
                actor,
                json!({ "verified": false, "reason": "invalid_otp" }),
                location,
                self.clock().now(),
            ))?;
            return Err(DispatchError::PreconditionFailed(
                "invalid verification code".to_string(),
            ));
        }

        let now = self.clock().now();
        let applied = self.store().update_ride_where(
            ride.id,
            &|r| r.status == RideStatus::DriverArrived,
            &|r| {
                r.status = RideStatus::TripStarted;
                r.trip_started_at = Some(now);
                r.updated_at = now;
            },
        )?;
        if !applied {
            return Err(DispatchError::RaceLost);
        }

        self.store().update_driver_where(
            driver_id,
            &|d| d.availability == Availability::Busy,
            &|d| {
                d.availability = Availability::OnTrip;
                d.updated_at = now;
            },
        )?;

        self.store().append_event(RideEvent::record(
            ride.id,
            RideEventType::OtpVerified,
            actor,
            json!({ "verified": true }),
            location,
            now,
        ))?;
        self.store().append_event(RideEvent::record(
            ride.id,
            RideEventType::TripStarted,
            actor,
            json!({}),
            location,
            now,
        ))?;

        info!(booking_id = %ride.id, driver_id = %driver_id, "code verified, trip started");

        Ok(OtpVerified {
            booking_id: ride.id,
            new_status: RideStatus::TripStarted,
            trip_started_at: now,
        })
    }
}
