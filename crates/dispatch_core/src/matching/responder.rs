//! The offer responder seam: how a pinged driver's accept/reject decision
//! reaches the engine.
//!
//! A real deployment wires this to the driver app's push/response channel
//! (the 30-second offer expiry is enforced separately by the reclamation
//! sweep). For simulations there is a seeded acceptance-rate model, and
//! tests use scripted responders.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::domain::{DriverId, Ride};

use super::candidates::DriverCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    Accepted,
    Rejected,
}

/// Decides whether a candidate takes the offered ride.
pub trait OfferResponder: Send + Sync {
    fn respond(&self, ride: &Ride, candidate: &DriverCandidate) -> OfferDecision;
}

fn fold_uuid(id: Uuid) -> u64 {
    let v = id.as_u128();
    (v as u64) ^ ((v >> 64) as u64)
}

/// Simulated driver behavior: accepts with probability equal to the
/// candidate's rolling acceptance rate. Seeded per (ride, driver) pair, so
/// the same offer always gets the same answer: reruns and concurrent
/// invocations see one consistent decision.
#[derive(Debug, Clone, Copy)]
pub struct AcceptanceRateResponder {
    seed: u64,
}

impl AcceptanceRateResponder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl OfferResponder for AcceptanceRateResponder {
    fn respond(&self, ride: &Ride, candidate: &DriverCandidate) -> OfferDecision {
        let mix = self.seed
            ^ fold_uuid(ride.id)
            ^ fold_uuid(candidate.driver_id).rotate_left(17);
        let mut rng = StdRng::seed_from_u64(mix);
        if rng.gen::<f64>() * 100.0 < candidate.acceptance_rate {
            OfferDecision::Accepted
        } else {
            OfferDecision::Rejected
        }
    }
}

/// Fixed decisions for tests: a default answer plus per-driver overrides.
#[derive(Debug, Clone)]
pub struct ScriptedResponder {
    default: OfferDecision,
    overrides: HashMap<DriverId, OfferDecision>,
}

impl ScriptedResponder {
    pub fn accept_all() -> Self {
        Self {
            default: OfferDecision::Accepted,
            overrides: HashMap::new(),
        }
    }

    pub fn reject_all() -> Self {
        Self {
            default: OfferDecision::Rejected,
            overrides: HashMap::new(),
        }
    }

    pub fn with_decision(mut self, driver_id: DriverId, decision: OfferDecision) -> Self {
        self.overrides.insert(driver_id, decision);
        self
    }
}

impl OfferResponder for ScriptedResponder {
    fn respond(&self, _ride: &Ride, candidate: &DriverCandidate) -> OfferDecision {
        self.overrides
            .get(&candidate.driver_id)
            .copied()
            .unwrap_or(self.default)
    }
}

/// Closure-backed responder for tests that need side effects (e.g. racing
/// a concurrent assignment between ping and accept).
pub struct FnResponder<F>(pub F)
where
    F: Fn(&Ride, &DriverCandidate) -> OfferDecision + Send + Sync;

impl<F> OfferResponder for FnResponder<F>
where
    F: Fn(&Ride, &DriverCandidate) -> OfferDecision + Send + Sync,
{
    fn respond(&self, ride: &Ride, candidate: &DriverCandidate) -> OfferDecision {
        (self.0)(ride, candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RideStatus;
    use crate::geo::Coordinates;
    use crate::test_helpers::test_ride;

    fn candidate(acceptance_rate: f64) -> DriverCandidate {
        DriverCandidate {
            driver_id: Uuid::new_v4(),
            name: "Driver".to_string(),
            rating: 4.5,
            distance_km: 1.0,
            idle_minutes: 1.0,
            acceptance_rate,
            priority_score: 50.0,
            location: Coordinates::new(12.97, 77.59),
        }
    }

    #[test]
    fn acceptance_model_is_deterministic_per_pair() {
        let responder = AcceptanceRateResponder::new(42);
        let ride = test_ride(RideStatus::Searching);
        let candidate = candidate(60.0);
        let first = responder.respond(&ride, &candidate);
        for _ in 0..10 {
            assert_eq!(responder.respond(&ride, &candidate), first);
        }
    }

    #[test]
    fn acceptance_model_follows_extreme_rates() {
        let responder = AcceptanceRateResponder::new(7);
        let ride = test_ride(RideStatus::Searching);
        assert_eq!(
            responder.respond(&ride, &candidate(100.0)),
            OfferDecision::Accepted
        );
        assert_eq!(
            responder.respond(&ride, &candidate(0.0)),
            OfferDecision::Rejected
        );
    }

    #[test]
    fn scripted_responder_honors_overrides() {
        let picky = Uuid::new_v4();
        let responder =
            ScriptedResponder::accept_all().with_decision(picky, OfferDecision::Rejected);
        let ride = test_ride(RideStatus::Searching);
        let mut c = candidate(100.0);
        assert_eq!(responder.respond(&ride, &c), OfferDecision::Accepted);
        c.driver_id = picky;
        assert_eq!(responder.respond(&ride, &c), OfferDecision::Rejected);
    }
}
