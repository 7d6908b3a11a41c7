//! Cancellation with fee assessment and driver release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Actor, Availability, Payment, PaymentStatus, RideEvent, RideEventType, RideId, RideStatus,
};
use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;
use crate::pricing;

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub booking_id: RideId,
    pub reason: Option<String>,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub booking_id: RideId,
    pub old_status: RideStatus,
    pub new_status: RideStatus,
    pub cancellation_fee: i64,
    pub cancelled_at: DateTime<Utc>,
}

impl Dispatch {
    /// Cancel a booking. The fee is a fixed share of the estimated fare
    /// determined by the current status; who may cancel at all is gated per
    /// status and role. A nonzero fee raises a pending payment against the
    /// rider.
    pub fn cancel(
        &self,
        caller: Option<Actor>,
        request: CancelRequest,
    ) -> DispatchResult<CancelOutcome> {
        let actor = self.require_caller(caller)?;
        let ride = self.load_participant_ride(request.booking_id, &actor)?;

        let is_driver = matches!(actor, Actor::Driver(_));
        let rule = self
            .config()
            .cancellation
            .rule_for(ride.status)
            .ok_or_else(|| {
                DispatchError::PreconditionFailed(format!(
                    "cannot cancel at status '{}'",
                    ride.status
                ))
            })?;

        if !rule.can_cancel {
            return Err(DispatchError::PreconditionFailed(
                "cannot cancel: ride is already in progress".to_string(),
            ));
        }
        match actor {
            Actor::Rider(_) if !rule.rider_may_cancel => {
                return Err(DispatchError::Unauthorized(
                    "rider cannot cancel at this stage".to_string(),
                ))
            }
            Actor::Driver(_) if !rule.driver_may_cancel => {
                return Err(DispatchError::Unauthorized(
                    "driver cannot cancel at this stage".to_string(),
                ))
            }
            Actor::System => {
                return Err(DispatchError::Unauthorized(
                    "cancellation requires a rider or driver identity".to_string(),
                ))
            }
            _ => {}
        }

        let fee = pricing::cancellation_fee(ride.estimated_fare, &rule);
        let new_status = if is_driver {
            RideStatus::CancelledByDriver
        } else {
            RideStatus::CancelledByUser
        };
        let old_status = ride.status;
        let now = self.clock().now();
        let reason = request.reason.clone();

        let applied = self.store().update_ride_where(
            ride.id,
            &|r| r.status == old_status,
            &|r| {
                r.status = new_status;
                r.cancelled_at = Some(now);
                r.cancellation_reason = reason.clone();
                r.final_fare = (fee > 0).then_some(fee);
                r.updated_at = now;
            },
        )?;
        if !applied {
            return Err(DispatchError::RaceLost);
        }

        if let Some(driver_id) = ride.driver_id {
            self.store().update_driver_where(
                driver_id,
                &|d| d.availability == Availability::Busy,
                &|d| {
                    d.availability = Availability::Online;
                    d.updated_at = now;
                },
            )?;

            // Non-critical metric; never fail the cancellation over it.
            if is_driver {
                if let Err(err) = self.store().update_driver_where(driver_id, &|_| true, &|d| {
                    d.cancellation_count += 1;
                }) {
                    warn!(driver_id = %driver_id, %err, "cancellation counter update failed");
                }
            }
        }

        self.store().append_event(RideEvent::record(
            ride.id,
            RideEventType::TripCancelled,
            actor,
            json!({
                "old_status": old_status,
                "reason": request.reason.as_deref().unwrap_or("no reason provided"),
                "cancellation_fee": fee,
                "cancelled_by": actor.kind(),
            }),
            request.location.or(Some(ride.pickup.position)),
            now,
        ))?;

        if fee > 0 {
            self.store().insert_payment(Payment {
                id: Uuid::new_v4(),
                ride_id: ride.id,
                user_id: ride.rider_id,
                amount: fee,
                method: ride.payment_method.clone(),
                status: PaymentStatus::Pending,
                created_at: now,
            })?;
        }

        info!(
            booking_id = %ride.id,
            %old_status,
            %new_status,
            fee,
            "booking cancelled"
        );

        Ok(CancelOutcome {
            booking_id: ride.id,
            old_status,
            new_status,
            cancellation_fee: fee,
            cancelled_at: now,
        })
    }
}
