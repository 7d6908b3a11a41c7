//! Settlement: compute the final fare after the trip and raise the payment.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Actor, Availability, Payment, PaymentStatus, RideEvent, RideEventType, RideId, RideStatus,
};
use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;
use crate::pricing;

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeRequest {
    pub booking_id: RideId,
    /// Odometer figures reported by the driver app; the booking-time
    /// estimate is used when absent.
    pub actual_distance_km: Option<f64>,
    pub actual_duration_minutes: Option<i64>,
    pub tip_amount: Option<i64>,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FareFinalized {
    pub booking_id: RideId,
    pub estimated_fare: i64,
    pub final_fare: i64,
    pub tip_amount: i64,
    pub total_amount: i64,
    pub payment_id: Uuid,
    pub status: RideStatus,
}

impl Dispatch {
    /// Recompute the fare over actual distance/duration (estimate figures
    /// when absent), same formula and floor as the quote. The tip is added
    /// after the floor. Forces the ride into `trip_completed`, releases the
    /// driver and creates the payment record.
    pub fn finalize_fare(
        &self,
        caller: Option<Actor>,
        request: FinalizeRequest,
    ) -> DispatchResult<FareFinalized> {
        let actor = self.require_caller(caller)?;
        let ride = self.load_participant_ride(request.booking_id, &actor)?;

        if !matches!(
            ride.status,
            RideStatus::TripInProgress | RideStatus::TripCompleted
        ) {
            return Err(DispatchError::PreconditionFailed(format!(
                "cannot finalize: booking status is '{}'",
                ride.status
            )));
        }

        let tariff = self
            .config()
            .tariffs
            .get(&ride.ride_class)
            .ok_or_else(|| {
                DispatchError::PreconditionFailed(format!(
                    "no tariff for ride class '{}'",
                    ride.ride_class
                ))
            })?;

        let distance_km = request.actual_distance_km.unwrap_or(ride.distance_km);
        let duration_minutes = request
            .actual_duration_minutes
            .unwrap_or(ride.duration_minutes);
        let final_fare = pricing::final_fare(
            tariff,
            distance_km,
            duration_minutes as f64,
            ride.surge_multiplier,
        );
        let tip_amount = request.tip_amount.unwrap_or(0);
        let total_amount = final_fare + tip_amount;

        let now = self.clock().now();
        let old_status = ride.status;
        let applied = self.store().update_ride_where(
            ride.id,
            &|r| r.status == old_status,
            &|r| {
                r.final_fare = Some(final_fare);
                r.status = RideStatus::TripCompleted;
                if r.trip_completed_at.is_none() {
                    r.trip_completed_at = Some(now);
                }
                r.actual_distance_km = request.actual_distance_km;
                r.actual_duration_minutes = request.actual_duration_minutes;
                r.updated_at = now;
            },
        )?;
        if !applied {
            return Err(DispatchError::RaceLost);
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            user_id: ride.rider_id,
            amount: total_amount,
            method: ride.payment_method.clone(),
            status: if ride.payment_method == "cash" {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Processing
            },
            created_at: now,
        };
        let payment_id = payment.id;
        self.store().insert_payment(payment)?;

        if let Some(driver_id) = ride.driver_id {
            self.store().update_driver_where(
                driver_id,
                &|d| d.availability == Availability::OnTrip,
                &|d| {
                    d.availability = Availability::Online;
                    d.updated_at = now;
                },
            )?;
        }

        self.store().append_event(RideEvent::record(
            ride.id,
            RideEventType::TripCompleted,
            actor,
            json!({
                "estimated_fare": ride.estimated_fare,
                "final_fare": final_fare,
                "tip_amount": tip_amount,
                "actual_distance_km": distance_km,
                "actual_duration_minutes": duration_minutes,
            }),
            request.location.or(Some(ride.drop.position)),
            now,
        ))?;

        info!(booking_id = %ride.id, final_fare, total_amount, "fare finalized");

        Ok(FareFinalized {
            booking_id: ride.id,
            estimated_fare: ride.estimated_fare,
            final_fare,
            tip_amount,
            total_amount,
            payment_id,
            status: RideStatus::TripCompleted,
        })
    }
}
