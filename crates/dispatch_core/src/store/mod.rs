//! Storage collaborator: durable inserts, point reads, filtered scans and
//! predicate-guarded updates.
//!
//! The backing store is out of scope; what the engines rely on is the shape
//! of its API. Every mutation that must not race goes through an
//! `update_*_where` call: the update applies only if the predicate still
//! holds on the row's current value, and the returned bool tells the caller
//! whether it won. Callers must check that bool; a conditional write that
//! "probably worked" is how assignments get lost.

mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

use crate::domain::{
    AttemptId, DriverId, DriverProfile, DriverSession, MatchAttempt, Payment, Ride, RideEvent,
    RideId, SessionId, SurgeZone,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object-safe store interface shared by every engine.
///
/// Scans take plain predicate closures rather than a query language; the
/// in-memory implementation walks its row maps, a real backend would compile
/// these into queries. Events are append-only and have no update call.
pub trait DispatchStore: Send + Sync {
    // Rides
    fn insert_ride(&self, ride: Ride) -> StoreResult<()>;
    fn ride(&self, id: RideId) -> StoreResult<Option<Ride>>;
    /// Conditional update: applies `apply` only while `predicate` holds.
    /// Returns whether the row was found and the update applied.
    fn update_ride_where(
        &self,
        id: RideId,
        predicate: &dyn Fn(&Ride) -> bool,
        apply: &dyn Fn(&mut Ride),
    ) -> StoreResult<bool>;
    fn rides_where(&self, predicate: &dyn Fn(&Ride) -> bool) -> StoreResult<Vec<Ride>>;

    // Driver profiles
    fn upsert_driver(&self, driver: DriverProfile) -> StoreResult<()>;
    fn driver(&self, id: DriverId) -> StoreResult<Option<DriverProfile>>;
    fn update_driver_where(
        &self,
        id: DriverId,
        predicate: &dyn Fn(&DriverProfile) -> bool,
        apply: &dyn Fn(&mut DriverProfile),
    ) -> StoreResult<bool>;
    fn drivers_where(
        &self,
        predicate: &dyn Fn(&DriverProfile) -> bool,
    ) -> StoreResult<Vec<DriverProfile>>;

    // Driver sessions
    fn insert_session(&self, session: DriverSession) -> StoreResult<()>;
    /// The single open (unended) session for a driver, if any.
    fn open_session(&self, driver_id: DriverId) -> StoreResult<Option<DriverSession>>;
    fn update_session_where(
        &self,
        id: SessionId,
        predicate: &dyn Fn(&DriverSession) -> bool,
        apply: &dyn Fn(&mut DriverSession),
    ) -> StoreResult<bool>;
    fn sessions_where(
        &self,
        predicate: &dyn Fn(&DriverSession) -> bool,
    ) -> StoreResult<Vec<DriverSession>>;

    // Match attempts
    fn insert_attempt(&self, attempt: MatchAttempt) -> StoreResult<()>;
    fn update_attempt_where(
        &self,
        id: AttemptId,
        predicate: &dyn Fn(&MatchAttempt) -> bool,
        apply: &dyn Fn(&mut MatchAttempt),
    ) -> StoreResult<bool>;
    fn attempts_where(
        &self,
        predicate: &dyn Fn(&MatchAttempt) -> bool,
    ) -> StoreResult<Vec<MatchAttempt>>;

    // Surge zones, keyed by (city_code, zone_id)
    fn upsert_zone(&self, zone: SurgeZone) -> StoreResult<()>;
    fn zones_where(&self, predicate: &dyn Fn(&SurgeZone) -> bool) -> StoreResult<Vec<SurgeZone>>;
    fn purge_zones_where(&self, predicate: &dyn Fn(&SurgeZone) -> bool) -> StoreResult<usize>;

    // Audit log (append-only)
    fn append_event(&self, event: RideEvent) -> StoreResult<()>;
    fn events_where(&self, predicate: &dyn Fn(&RideEvent) -> bool) -> StoreResult<Vec<RideEvent>>;

    // Payments
    fn insert_payment(&self, payment: Payment) -> StoreResult<()>;
    fn payments_where(&self, predicate: &dyn Fn(&Payment) -> bool) -> StoreResult<Vec<Payment>>;
}
