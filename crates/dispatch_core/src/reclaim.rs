//! Reclamation: periodic sweeps that force progress when an actor goes
//! silent, and promotion of due scheduled rides into the matching pipeline.
//!
//! Every sweep is idempotent: each mutation is guarded by a predicate on
//! the state being reclaimed, so re-running on an unchanged store touches
//! nothing.

use chrono::Duration;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{MatchingConfig, ReclaimConfig};
use crate::domain::{
    Actor, Availability, OfferResponse, RideEvent, RideEventType, RideId, RideStatus, TimingMode,
};
use crate::error::{DispatchError, DispatchResult};
use crate::matching::{match_ride, OfferResponder};
use crate::store::DispatchStore;

const SESSION_END_REASON: &str = "inactivity_timeout";
const SEARCH_TIMEOUT_REASON: &str = "No driver found within timeout period";

/// Aggregate counts from one reclamation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclaimSummary {
    pub sessions_ended: usize,
    pub drivers_set_offline: usize,
    pub rides_auto_cancelled: usize,
    pub offers_timed_out: usize,
}

/// Run the three reclamation sweeps: stale sessions, stale searches and
/// expired match offers.
pub fn run_sweeps(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    config: &ReclaimConfig,
) -> DispatchResult<ReclaimSummary> {
    let now = clock.now();
    let mut summary = ReclaimSummary::default();

    // 1. Sessions with no heartbeat inside the staleness window are closed
    //    and their drivers taken offline, unless mid-trip.
    let stale_cutoff = now - Duration::minutes(config.session_stale_minutes);
    let stale_sessions =
        store.sessions_where(&|s| s.is_open() && s.last_heartbeat < stale_cutoff)?;
    for session in stale_sessions {
        let ended = store.update_session_where(
            session.id,
            &|s| s.is_open() && s.last_heartbeat < stale_cutoff,
            &|s| {
                s.ended_at = Some(now);
                s.end_reason = Some(SESSION_END_REASON.to_string());
            },
        )?;
        if !ended {
            continue;
        }
        summary.sessions_ended += 1;

        let offlined = store.update_driver_where(
            session.driver_id,
            &|d| {
                d.availability != Availability::OnTrip && d.availability != Availability::Offline
            },
            &|d| {
                d.availability = Availability::Offline;
                d.updated_at = now;
            },
        )?;
        if offlined {
            summary.drivers_set_offline += 1;
        }
    }

    // 2. Immediate rides still searching past the timeout are abandoned.
    let search_cutoff = now - Duration::minutes(config.search_timeout_minutes);
    let stale_rides = store.rides_where(&|r| {
        r.status == RideStatus::Searching
            && r.timing_mode == TimingMode::Now
            && r.requested_at < search_cutoff
    })?;
    for ride in stale_rides {
        let cancelled = store.update_ride_where(
            ride.id,
            &|r| r.status == RideStatus::Searching,
            &|r| {
                r.status = RideStatus::AutoCancelled;
                r.cancelled_at = Some(now);
                r.cancellation_reason = Some(SEARCH_TIMEOUT_REASON.to_string());
                r.updated_at = now;
            },
        )?;
        if !cancelled {
            continue;
        }
        summary.rides_auto_cancelled += 1;
        store.append_event(RideEvent::record(
            ride.id,
            RideEventType::TripCancelled,
            Actor::System,
            json!({
                "reason": "auto_cancelled_no_driver",
                "timeout_minutes": config.search_timeout_minutes,
            }),
            None,
            now,
        ))?;
    }

    // 3. Offers nobody answered are marked timed out.
    let expired = store.attempts_where(&|a| {
        a.response == OfferResponse::Pending && a.expires_at < now
    })?;
    for attempt in expired {
        let timed_out = store.update_attempt_where(
            attempt.id,
            &|a| a.response == OfferResponse::Pending && a.expires_at < now,
            &|a| {
                a.response = OfferResponse::Timeout;
                a.responded_at = Some(now);
            },
        )?;
        if timed_out {
            summary.offers_timed_out += 1;
        }
    }

    info!(
        sessions_ended = summary.sessions_ended,
        drivers_set_offline = summary.drivers_set_offline,
        rides_auto_cancelled = summary.rides_auto_cancelled,
        offers_timed_out = summary.offers_timed_out,
        "reclamation pass finished"
    );

    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionRecord {
    pub booking_id: RideId,
    pub matched: bool,
}

/// Aggregate result of one scheduled-ride promotion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromotionSummary {
    pub rides_processed: usize,
    pub rides_matched: usize,
    pub rides_failed: usize,
    pub details: Vec<PromotionRecord>,
}

/// Promote scheduled rides whose pickup time is inside the promotion window
/// into `searching` and run the matcher on them. A ride that fails to match
/// is reverted to `scheduled` for the next pass; its retry counter keeps the
/// total bounded. After the cap it stays `scheduled` with no further
/// automatic handling.
pub fn promote_scheduled(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    responder: &dyn OfferResponder,
    matching: &MatchingConfig,
    config: &ReclaimConfig,
) -> DispatchResult<PromotionSummary> {
    let now = clock.now();
    let window_end = now + Duration::minutes(config.promotion_window_minutes);
    let retry_cap = config.promotion_retry_cap;

    let mut due = store.rides_where(&|r| {
        r.status == RideStatus::Scheduled
            && r.timing_mode == TimingMode::Scheduled
            && r.scheduled_time.map_or(false, |t| t <= window_end)
            && r.scheduled_match_retry_count < retry_cap
    })?;
    due.sort_by_key(|r| r.scheduled_time);
    due.truncate(config.promotion_batch_size);

    let mut summary = PromotionSummary::default();
    for ride in due {
        let promoted = store.update_ride_where(
            ride.id,
            &|r| {
                r.status == RideStatus::Scheduled
                    && r.scheduled_match_retry_count < retry_cap
            },
            &|r| {
                r.status = RideStatus::Searching;
                r.scheduled_match_retry_count += 1;
                r.scheduled_match_attempted_at = Some(now);
                r.updated_at = now;
            },
        )?;
        if !promoted {
            continue;
        }
        summary.rides_processed += 1;

        store.append_event(RideEvent::record(
            ride.id,
            RideEventType::DriverSearchStarted,
            Actor::System,
            json!({
                "trigger": "scheduled_ride_promotion",
                "scheduled_time": ride.scheduled_time,
                "retry_count": ride.scheduled_match_retry_count + 1,
            }),
            None,
            now,
        ))?;

        let matched = match match_ride(
            store,
            clock,
            responder,
            matching,
            ride.id,
            config.promotion_radius_km,
            config.promotion_max_attempts,
        ) {
            Ok(outcome) => outcome.matched,
            Err(DispatchError::Store(err)) => return Err(DispatchError::Store(err)),
            Err(err) => {
                warn!(booking_id = %ride.id, %err, "promotion match failed");
                false
            }
        };

        if matched {
            summary.rides_matched += 1;
        } else {
            summary.rides_failed += 1;
            // Put it back for the next pass; conditional so a concurrent
            // assignment between match and revert is not clobbered.
            store.update_ride_where(
                ride.id,
                &|r| r.status == RideStatus::Searching,
                &|r| {
                    r.status = RideStatus::Scheduled;
                    r.updated_at = now;
                },
            )?;
        }
        summary.details.push(PromotionRecord {
            booking_id: ride.id,
            matched,
        });
    }

    info!(
        rides_processed = summary.rides_processed,
        rides_matched = summary.rides_matched,
        rides_failed = summary.rides_failed,
        "scheduled-ride promotion pass finished"
    );

    Ok(summary)
}
