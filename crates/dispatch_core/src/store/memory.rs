//! In-memory store for tests, examples and single-process deployments.
//!
//! Each call takes the row-map mutex for its duration, so a predicate-guarded
//! update is atomic with respect to every other call, the same per-row
//! guarantee a real backend's conditional write gives. The mutex lives
//! inside the collaborator; the engines themselves stay lock-free.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{
    AttemptId, DriverId, DriverProfile, DriverSession, MatchAttempt, Payment, Ride, RideEvent,
    RideId, SessionId, SurgeZone,
};

use super::{DispatchStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Rows {
    rides: HashMap<RideId, Ride>,
    drivers: HashMap<DriverId, DriverProfile>,
    sessions: HashMap<SessionId, DriverSession>,
    attempts: HashMap<AttemptId, MatchAttempt>,
    zones: HashMap<(String, String), SurgeZone>,
    events: Vec<RideEvent>,
    payments: Vec<Payment>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Rows>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Backend("row mutex poisoned".to_string()))
    }
}

impl DispatchStore for MemoryStore {
    fn insert_ride(&self, ride: Ride) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.rides.insert(ride.id, ride);
        Ok(())
    }

    fn ride(&self, id: RideId) -> StoreResult<Option<Ride>> {
        Ok(self.lock()?.rides.get(&id).cloned())
    }

    fn update_ride_where(
        &self,
        id: RideId,
        predicate: &dyn Fn(&Ride) -> bool,
        apply: &dyn Fn(&mut Ride),
    ) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.rides.get_mut(&id) {
            Some(ride) if predicate(ride) => {
                apply(ride);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn rides_where(&self, predicate: &dyn Fn(&Ride) -> bool) -> StoreResult<Vec<Ride>> {
        Ok(self
            .lock()?
            .rides
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    fn upsert_driver(&self, driver: DriverProfile) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.drivers.insert(driver.id, driver);
        Ok(())
    }

    fn driver(&self, id: DriverId) -> StoreResult<Option<DriverProfile>> {
        Ok(self.lock()?.drivers.get(&id).cloned())
    }

    fn update_driver_where(
        &self,
        id: DriverId,
        predicate: &dyn Fn(&DriverProfile) -> bool,
        apply: &dyn Fn(&mut DriverProfile),
    ) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.drivers.get_mut(&id) {
            Some(driver) if predicate(driver) => {
                apply(driver);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn drivers_where(
        &self,
        predicate: &dyn Fn(&DriverProfile) -> bool,
    ) -> StoreResult<Vec<DriverProfile>> {
        Ok(self
            .lock()?
            .drivers
            .values()
            .filter(|d| predicate(d))
            .cloned()
            .collect())
    }

    fn insert_session(&self, session: DriverSession) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.sessions.insert(session.id, session);
        Ok(())
    }

    fn open_session(&self, driver_id: DriverId) -> StoreResult<Option<DriverSession>> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.driver_id == driver_id && s.is_open())
            .cloned())
    }

    fn update_session_where(
        &self,
        id: SessionId,
        predicate: &dyn Fn(&DriverSession) -> bool,
        apply: &dyn Fn(&mut DriverSession),
    ) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.sessions.get_mut(&id) {
            Some(session) if predicate(session) => {
                apply(session);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn sessions_where(
        &self,
        predicate: &dyn Fn(&DriverSession) -> bool,
    ) -> StoreResult<Vec<DriverSession>> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| predicate(s))
            .cloned()
            .collect())
    }

    fn insert_attempt(&self, attempt: MatchAttempt) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.attempts.insert(attempt.id, attempt);
        Ok(())
    }

    fn update_attempt_where(
        &self,
        id: AttemptId,
        predicate: &dyn Fn(&MatchAttempt) -> bool,
        apply: &dyn Fn(&mut MatchAttempt),
    ) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        match rows.attempts.get_mut(&id) {
            Some(attempt) if predicate(attempt) => {
                apply(attempt);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn attempts_where(
        &self,
        predicate: &dyn Fn(&MatchAttempt) -> bool,
    ) -> StoreResult<Vec<MatchAttempt>> {
        Ok(self
            .lock()?
            .attempts
            .values()
            .filter(|a| predicate(a))
            .cloned()
            .collect())
    }

    fn upsert_zone(&self, zone: SurgeZone) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.zones
            .insert((zone.city_code.clone(), zone.zone_id.clone()), zone);
        Ok(())
    }

    fn zones_where(&self, predicate: &dyn Fn(&SurgeZone) -> bool) -> StoreResult<Vec<SurgeZone>> {
        Ok(self
            .lock()?
            .zones
            .values()
            .filter(|z| predicate(z))
            .cloned()
            .collect())
    }

    fn purge_zones_where(&self, predicate: &dyn Fn(&SurgeZone) -> bool) -> StoreResult<usize> {
        let mut rows = self.lock()?;
        let before = rows.zones.len();
        rows.zones.retain(|_, z| !predicate(z));
        Ok(before - rows.zones.len())
    }

    fn append_event(&self, event: RideEvent) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.events.push(event);
        Ok(())
    }

    fn events_where(&self, predicate: &dyn Fn(&RideEvent) -> bool) -> StoreResult<Vec<RideEvent>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect())
    }

    fn insert_payment(&self, payment: Payment) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.payments.push(payment);
        Ok(())
    }

    fn payments_where(&self, predicate: &dyn Fn(&Payment) -> bool) -> StoreResult<Vec<Payment>> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .filter(|p| predicate(p))
            .cloned()
            .collect())
    }
}
