//! Ride lifecycle: the transition table, the status→event mapping, and the
//! conditional status write every other component goes through.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::clock::Clock;
use crate::config::CancellationPolicy;
use crate::domain::{Actor, Availability, Ride, RideEvent, RideEventType, RideId, RideStatus};
use crate::error::{DispatchError, DispatchResult};
use crate::geo::Coordinates;
use crate::store::DispatchStore;

/// Legal forward transitions. Anything not listed is rejected.
pub fn allowed_transitions(from: RideStatus) -> &'static [RideStatus] {
    use RideStatus::*;
    match from {
        Idle => &[Searching],
        Searching => &[DriverAssigned, CancelledByUser, AutoCancelled],
        Scheduled => &[Searching, CancelledByUser],
        DriverAssigned => &[DriverEnRoute, CancelledByUser, CancelledByDriver],
        DriverEnRoute => &[DriverArrived, CancelledByUser, CancelledByDriver],
        DriverArrived => &[TripStarted, CancelledByUser, CancelledByDriver],
        TripStarted => &[TripInProgress, CancelledByUser, CancelledByDriver],
        TripInProgress => &[TripCompleted, CancelledByUser, CancelledByDriver],
        TripCompleted => &[PaymentCompleted],
        PaymentCompleted | CancelledByUser | CancelledByDriver | AutoCancelled => &[],
    }
}

/// Audit event type recorded when a ride lands in a status.
pub fn event_type_for(status: RideStatus) -> RideEventType {
    use RideStatus::*;
    match status {
        Idle => RideEventType::BookingCreated,
        Searching | Scheduled => RideEventType::DriverSearchStarted,
        DriverAssigned => RideEventType::DriverAssigned,
        DriverEnRoute => RideEventType::DriverEnRoute,
        DriverArrived => RideEventType::DriverArrived,
        // Progress reports after pickup share one event type.
        TripStarted | TripInProgress => RideEventType::TripStarted,
        TripCompleted => RideEventType::TripCompleted,
        PaymentCompleted => RideEventType::PaymentCompleted,
        CancelledByUser | CancelledByDriver | AutoCancelled => RideEventType::TripCancelled,
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub ride_id: RideId,
    pub old_status: RideStatus,
    pub new_status: RideStatus,
    pub updated_at: DateTime<Utc>,
}

/// Checks that `actor` may move `ride` into a cancellation status. The
/// per-status role rules mirror the cancellation-fee policy.
fn authorize_cancellation(
    policy: &CancellationPolicy,
    ride: &Ride,
    requested: RideStatus,
    actor: &Actor,
) -> DispatchResult<()> {
    let rule = policy.rule_for(ride.status);
    match (requested, actor) {
        (RideStatus::CancelledByUser, Actor::Rider(_)) => {
            if rule.map_or(false, |r| r.rider_may_cancel) {
                Ok(())
            } else {
                Err(DispatchError::Unauthorized(format!(
                    "rider may not cancel at '{}'",
                    ride.status
                )))
            }
        }
        (RideStatus::CancelledByDriver, Actor::Driver(_)) => {
            if rule.map_or(false, |r| r.driver_may_cancel) {
                Ok(())
            } else {
                Err(DispatchError::Unauthorized(format!(
                    "driver may not cancel at '{}'",
                    ride.status
                )))
            }
        }
        (RideStatus::AutoCancelled, Actor::System) => Ok(()),
        // System performs forced transitions during reclamation.
        (RideStatus::CancelledByUser | RideStatus::CancelledByDriver, Actor::System) => Ok(()),
        _ => Err(DispatchError::Unauthorized(format!(
            "{} may not request '{}'",
            actor.kind(),
            requested
        ))),
    }
}

/// Validates and applies one status transition.
///
/// On success the ride's status, `updated_at` and the status-specific
/// timestamp are written behind a predicate on the old status (a concurrent
/// transition loses with [`DispatchError::RaceLost`]), one audit event is
/// appended, and a cancelled ride's driver is released `busy → online`.
#[allow(clippy::too_many_arguments)]
pub fn apply_transition(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    policy: &CancellationPolicy,
    ride_id: RideId,
    requested: RideStatus,
    actor: &Actor,
    reason: Option<&str>,
    location: Option<Coordinates>,
    metadata: Option<serde_json::Value>,
) -> DispatchResult<TransitionOutcome> {
    let ride = store
        .ride(ride_id)?
        .ok_or(DispatchError::NotFound("booking"))?;

    if !ride.is_participant(actor) {
        return Err(DispatchError::Unauthorized(
            "caller is not a participant of this booking".to_string(),
        ));
    }

    let old_status = ride.status;
    if !allowed_transitions(old_status).contains(&requested) {
        return Err(DispatchError::InvalidTransition {
            from: old_status,
            to: requested,
        });
    }

    if requested.is_cancellation() {
        authorize_cancellation(policy, &ride, requested, actor)?;
    }

    let now = clock.now();
    let reason_owned = reason.map(str::to_string);
    let applied = store.update_ride_where(
        ride_id,
        &|r| r.status == old_status,
        &|r| {
            r.status = requested;
            r.updated_at = now;
            match requested {
                RideStatus::DriverAssigned => r.driver_assigned_at = Some(now),
                RideStatus::DriverArrived => r.driver_arrived_at = Some(now),
                RideStatus::TripStarted => r.trip_started_at = Some(now),
                RideStatus::TripCompleted => r.trip_completed_at = Some(now),
                s if s.is_cancellation() => {
                    r.cancelled_at = Some(now);
                    r.cancellation_reason = reason_owned.clone();
                }
                _ => {}
            }
        },
    )?;
    if !applied {
        return Err(DispatchError::RaceLost);
    }

    let mut payload = json!({
        "old_status": old_status,
        "new_status": requested,
    });
    if let (Some(serde_json::Value::Object(extra)), serde_json::Value::Object(base)) =
        (metadata, &mut payload)
    {
        base.extend(extra);
    }
    store.append_event(RideEvent::record(
        ride_id,
        event_type_for(requested),
        *actor,
        payload,
        location,
        now,
    ))?;

    if requested.is_cancellation() {
        if let Some(driver_id) = ride.driver_id {
            store.update_driver_where(
                driver_id,
                &|d| d.availability == Availability::Busy,
                &|d| {
                    d.availability = Availability::Online;
                    d.updated_at = now;
                },
            )?;
        }
    }

    Ok(TransitionOutcome {
        ride_id,
        old_status,
        new_status: requested,
        updated_at: now,
    })
}
