//! Sequential offer loop and the atomic driver hand-off.

use chrono::Duration;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::MatchingConfig;
use crate::domain::{
    Actor, Availability, DriverId, MatchAttempt, OfferResponse, Ride, RideEvent, RideEventType,
    RideId, RideStatus,
};
use crate::error::{DispatchError, DispatchResult};
use crate::store::DispatchStore;

use super::candidates::{eta_minutes, find_candidates, DriverCandidate};
use super::responder::{OfferDecision, OfferResponder};

/// Outcome of one matching invocation.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub matched: bool,
    pub driver_id: Option<DriverId>,
    pub driver_name: Option<String>,
    pub driver_rating: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub attempts_made: u32,
}

impl MatchOutcome {
    fn unmatched(attempts_made: u32) -> Self {
        Self {
            matched: false,
            driver_id: None,
            driver_name: None,
            driver_rating: None,
            eta_minutes: None,
            attempts_made,
        }
    }
}

/// Find and assign a driver for a `searching` ride.
///
/// Candidates are offered the ride one at a time in rank order, up to
/// `max_attempts`. Assignment is a conditional update on the ride row, so
/// concurrent invocations for the same ride are safe: exactly one wins, the
/// rest observe the race and report unmatched. No in-process lock is
/// involved.
pub fn match_ride(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    responder: &dyn OfferResponder,
    config: &MatchingConfig,
    ride_id: RideId,
    radius_km: f64,
    max_attempts: u32,
) -> DispatchResult<MatchOutcome> {
    let ride = store
        .ride(ride_id)?
        .ok_or(DispatchError::NotFound("booking"))?;

    if ride.status != RideStatus::Searching {
        return Err(DispatchError::PreconditionFailed(format!(
            "cannot match: booking status is '{}', expected 'searching'",
            ride.status
        )));
    }

    let candidates = find_candidates(
        store,
        clock,
        &ride.city_code,
        ride.pickup.position,
        radius_km,
        config.default_idle_secs,
    )?;

    if candidates.is_empty() {
        store.append_event(RideEvent::record(
            ride_id,
            RideEventType::DriverSearchStarted,
            Actor::System,
            json!({
                "search_radius_km": radius_km,
                "candidates_found": 0,
                "result": "no_drivers_available",
            }),
            Some(ride.pickup.position),
            clock.now(),
        ))?;
        info!(ride_id = %ride_id, "no candidates within radius");
        return Ok(MatchOutcome::unmatched(0));
    }

    let mut attempts_made = 0;
    for candidate in candidates.iter().take(max_attempts as usize) {
        attempts_made += 1;
        let eta = eta_minutes(candidate.distance_km, config.eta_minutes_per_km);
        let attempt = record_attempt(store, clock, config, &ride, candidate, attempts_made, eta)?;

        match responder.respond(&ride, candidate) {
            OfferDecision::Rejected => {
                let responded_at = clock.now();
                store.update_attempt_where(
                    attempt.id,
                    &|a| a.response == OfferResponse::Pending,
                    &|a| {
                        a.response = OfferResponse::Rejected;
                        a.responded_at = Some(responded_at);
                    },
                )?;
                store.append_event(RideEvent::record(
                    ride_id,
                    RideEventType::DriverRejected,
                    Actor::Driver(candidate.driver_id),
                    json!({ "attempt_order": attempts_made }),
                    None,
                    responded_at,
                ))?;
                debug!(ride_id = %ride_id, driver_id = %candidate.driver_id, "offer rejected");
            }
            OfferDecision::Accepted => {
                if assign_driver(store, clock, ride_id, &attempt)? {
                    store.append_event(RideEvent::record(
                        ride_id,
                        RideEventType::DriverAssigned,
                        Actor::Driver(candidate.driver_id),
                        json!({
                            "driver_name": candidate.name,
                            "driver_rating": candidate.rating,
                            "distance_km": candidate.distance_km,
                            "eta_minutes": eta,
                            "attempts_made": attempts_made,
                        }),
                        Some(candidate.location),
                        clock.now(),
                    ))?;
                    info!(
                        ride_id = %ride_id,
                        driver_id = %candidate.driver_id,
                        attempts_made,
                        "driver assigned"
                    );
                    return Ok(MatchOutcome {
                        matched: true,
                        driver_id: Some(candidate.driver_id),
                        driver_name: Some(candidate.name.clone()),
                        driver_rating: Some(candidate.rating),
                        eta_minutes: Some(eta),
                        attempts_made,
                    });
                }
                // Lost the race: another invocation assigned this ride
                // between our status check and the conditional write.
                warn!(ride_id = %ride_id, "assignment lost race, reporting unmatched");
                return Ok(MatchOutcome::unmatched(attempts_made));
            }
        }
    }

    Ok(MatchOutcome::unmatched(attempts_made))
}

fn record_attempt(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    config: &MatchingConfig,
    ride: &Ride,
    candidate: &DriverCandidate,
    attempt_order: u32,
    eta: u32,
) -> DispatchResult<MatchAttempt> {
    let now = clock.now();
    let attempt = MatchAttempt {
        id: Uuid::new_v4(),
        ride_id: ride.id,
        driver_id: candidate.driver_id,
        attempt_order,
        distance_km: (candidate.distance_km * 100.0).round() / 100.0,
        eta_minutes: eta,
        expires_at: now + Duration::seconds(config.offer_expiry_secs),
        response: OfferResponse::Pending,
        responded_at: None,
        was_assigned: false,
    };
    store.insert_attempt(attempt.clone())?;
    store.append_event(RideEvent::record(
        ride.id,
        RideEventType::DriverPinged,
        Actor::Driver(candidate.driver_id),
        json!({
            "attempt_order": attempt_order,
            "distance_km": attempt.distance_km,
            "eta_minutes": eta,
        }),
        Some(candidate.location),
        now,
    ))?;
    Ok(attempt)
}

/// The atomic hand-off. The ride update is the linearization point: it only
/// applies while the ride is still `searching`, which is what guarantees at
/// most one winner across concurrent invocations. The driver flip and the
/// attempt bookkeeping follow, each conditional on its own expected state.
fn assign_driver(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    ride_id: RideId,
    attempt: &MatchAttempt,
) -> DispatchResult<bool> {
    let now = clock.now();
    let driver_id = attempt.driver_id;

    let applied = store.update_ride_where(
        ride_id,
        &|r| r.status == RideStatus::Searching,
        &|r| {
            r.status = RideStatus::DriverAssigned;
            r.driver_id = Some(driver_id);
            r.driver_assigned_at = Some(now);
            r.updated_at = now;
        },
    )?;
    if !applied {
        return Ok(false);
    }

    store.update_driver_where(
        driver_id,
        &|d| d.availability == Availability::Online,
        &|d| {
            d.availability = Availability::Busy;
            d.updated_at = now;
        },
    )?;

    store.update_attempt_where(
        attempt.id,
        &|a| a.response == OfferResponse::Pending,
        &|a| {
            a.response = OfferResponse::Accepted;
            a.was_assigned = true;
            a.responded_at = Some(now);
        },
    )?;

    Ok(true)
}
