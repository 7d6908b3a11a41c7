//! Booking creation: the first step of the ride lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Actor, Location, Ride, RideEvent, RideEventType, RideId, RideStatus, TimingMode,
};
use crate::error::{DispatchError, DispatchResult};

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub pickup: Location,
    pub drop: Location,
    pub ride_class: String,
    pub city_code: String,
    pub timing_mode: TimingMode,
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Route and fare figures carried over from the estimate the rider saw.
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub estimated_fare: i64,
    pub surge_multiplier: Option<f64>,
    pub route_polyline: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCreated {
    pub booking_id: RideId,
    pub status: RideStatus,
    pub otp: String,
    pub requested_at: DateTime<Utc>,
}

impl Dispatch {
    /// Create a ride booking. Immediate bookings start in `searching`;
    /// everything else waits in `scheduled` for the promotion sweep.
    pub fn create_booking(
        &self,
        caller: Option<Actor>,
        request: CreateBookingRequest,
    ) -> DispatchResult<BookingCreated> {
        let actor = self.require_caller(caller)?;
        let rider_id = match actor {
            Actor::Rider(id) => id,
            _ => {
                return Err(DispatchError::Unauthorized(
                    "only a rider may create a booking".to_string(),
                ))
            }
        };

        if self.config().tariffs.get(&request.ride_class).is_none() {
            return Err(DispatchError::PreconditionFailed(format!(
                "unknown ride class '{}'",
                request.ride_class
            )));
        }
        if request.timing_mode == TimingMode::Scheduled && request.scheduled_time.is_none() {
            return Err(DispatchError::PreconditionFailed(
                "scheduled bookings need a scheduled_time".to_string(),
            ));
        }

        let now = self.clock().now();
        let otp = self.generate_otp();
        let status = if request.timing_mode == TimingMode::Now {
            RideStatus::Searching
        } else {
            RideStatus::Scheduled
        };

        let ride = Ride {
            id: Uuid::new_v4(),
            rider_id,
            driver_id: None,
            status,
            city_code: request.city_code,
            pickup: request.pickup.clone(),
            drop: request.drop,
            ride_class: request.ride_class.clone(),
            timing_mode: request.timing_mode,
            scheduled_time: request.scheduled_time,
            distance_km: request.distance_km,
            duration_minutes: request.duration_minutes,
            actual_distance_km: None,
            actual_duration_minutes: None,
            estimated_fare: request.estimated_fare,
            final_fare: None,
            surge_multiplier: request.surge_multiplier.unwrap_or(1.0),
            otp: otp.clone(),
            payment_method: request.payment_method.unwrap_or_else(|| "cash".to_string()),
            route_polyline: request.route_polyline,
            requested_at: now,
            updated_at: now,
            driver_assigned_at: None,
            driver_arrived_at: None,
            trip_started_at: None,
            trip_completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            scheduled_match_retry_count: 0,
            scheduled_match_attempted_at: None,
        };
        let booking_id = ride.id;
        self.store().insert_ride(ride)?;

        self.store().append_event(RideEvent::record(
            booking_id,
            RideEventType::BookingCreated,
            actor,
            json!({
                "ride_class": request.ride_class,
                "timing_mode": request.timing_mode,
                "estimated_fare": request.estimated_fare,
                "distance_km": request.distance_km,
            }),
            Some(request.pickup.position),
            now,
        ))?;

        if request.timing_mode == TimingMode::Now {
            self.store().append_event(RideEvent::record(
                booking_id,
                RideEventType::DriverSearchStarted,
                Actor::System,
                json!({ "search_radius_km": self.config().matching.search_radius_km }),
                Some(request.pickup.position),
                now,
            ))?;
        }

        info!(booking_id = %booking_id, status = %status, "booking created");

        Ok(BookingCreated {
            booking_id,
            status,
            otp,
            requested_at: now,
        })
    }
}
