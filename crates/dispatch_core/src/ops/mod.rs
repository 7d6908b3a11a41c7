//! Invocable operations: each is a request/response unit over the shared
//! store, triggered by a rider, a driver, or the scheduler.
//!
//! [`Dispatch`] bundles the collaborators every operation needs: store,
//! clock, route provider, offer responder and configuration. It holds no
//! per-ride state and no locks; the operations stay reentrant and safe to
//! invoke concurrently from independent processes.

pub mod cancel;
pub mod create_booking;
pub mod estimate;
pub mod finalize;
pub mod heartbeat;
pub mod match_driver;
pub mod update_status;
pub mod verify_otp;

pub use cancel::{CancelOutcome, CancelRequest};
pub use create_booking::{BookingCreated, CreateBookingRequest};
pub use estimate::EstimateRequest;
pub use finalize::{FareFinalized, FinalizeRequest};
pub use heartbeat::{HeartbeatOutcome, HeartbeatRequest};
pub use update_status::UpdateStatusRequest;
pub use verify_otp::{OtpVerified, VerifyOtpRequest};

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::domain::{Actor, Ride, RideId};
use crate::error::{DispatchError, DispatchResult};
use crate::matching::OfferResponder;
use crate::reclaim::{self, PromotionSummary, ReclaimSummary};
use crate::routing::RouteProvider;
use crate::store::DispatchStore;
use crate::surge::{self, SurgeSummary};

/// Shared context for all operations.
pub struct Dispatch {
    store: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
    routes: Arc<dyn RouteProvider>,
    responder: Arc<dyn OfferResponder>,
    config: DispatchConfig,
    rng: Mutex<StdRng>,
}

impl Dispatch {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        clock: Arc<dyn Clock>,
        routes: Arc<dyn RouteProvider>,
        responder: Arc<dyn OfferResponder>,
        config: DispatchConfig,
    ) -> Self {
        let rng = Mutex::new(StdRng::seed_from_u64(config.seed));
        Self {
            store,
            clock,
            routes,
            responder,
            config,
            rng,
        }
    }

    pub fn store(&self) -> &dyn DispatchStore {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub(crate) fn routes(&self) -> &dyn RouteProvider {
        self.routes.as_ref()
    }

    pub(crate) fn responder(&self) -> &dyn OfferResponder {
        self.responder.as_ref()
    }

    /// 4-digit one-time code from the seeded context RNG.
    pub(crate) fn generate_otp(&self) -> String {
        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        format!("{}", rng.gen_range(1000..10000))
    }

    pub(crate) fn require_caller(&self, caller: Option<Actor>) -> DispatchResult<Actor> {
        caller.ok_or(DispatchError::Unauthenticated)
    }

    pub(crate) fn load_ride(&self, id: RideId) -> DispatchResult<Ride> {
        self.store
            .ride(id)?
            .ok_or(DispatchError::NotFound("booking"))
    }

    /// Loads the ride and verifies the caller participates in it.
    pub(crate) fn load_participant_ride(
        &self,
        id: RideId,
        actor: &Actor,
    ) -> DispatchResult<Ride> {
        let ride = self.load_ride(id)?;
        if !ride.is_participant(actor) {
            return Err(DispatchError::Unauthorized(
                "caller is not a participant of this booking".to_string(),
            ));
        }
        Ok(ride)
    }

    // Scheduler entry points, thin wrappers over the engine modules so a
    // periodic runner only needs the context.

    /// Stale-session, stale-search and expired-offer sweeps.
    pub fn run_reclamation(&self) -> DispatchResult<ReclaimSummary> {
        reclaim::run_sweeps(self.store(), self.clock(), &self.config.reclaim)
    }

    /// Promote due scheduled rides into the matching pipeline.
    pub fn promote_scheduled_rides(&self) -> DispatchResult<PromotionSummary> {
        reclaim::promote_scheduled(
            self.store(),
            self.clock(),
            self.responder(),
            &self.config.matching,
            &self.config.reclaim,
        )
    }

    /// Recompute per-city surge zones.
    pub fn recompute_surge(&self) -> DispatchResult<SurgeSummary> {
        surge::recompute(self.store(), self.clock(), &self.config.surge)
    }
}
