//! Test helpers for common setup and fixtures.
//!
//! Shared across the unit and integration tests to keep entity construction
//! in one place.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::clock::ManualClock;
use crate::config::DispatchConfig;
use crate::domain::{
    Availability, DriverProfile, DriverSession, Location, Ride, RideStatus, TimingMode,
};
use crate::geo::Coordinates;
use crate::matching::{OfferResponder, ScriptedResponder};
use crate::ops::Dispatch;
use crate::routing::HaversineRouteProvider;
use crate::store::MemoryStore;

/// City every fixture lives in.
pub const TEST_CITY: &str = "BLR";

/// Fixed instant all test clocks start from.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 8, 0, 0)
        .single()
        .expect("valid test epoch")
}

pub fn test_pickup() -> Coordinates {
    Coordinates::new(12.9716, 77.5946)
}

pub fn test_drop() -> Coordinates {
    Coordinates::new(12.9352, 77.6245)
}

pub fn test_location(name: &str, position: Coordinates) -> Location {
    Location {
        address: format!("{name}, Bengaluru"),
        short_name: Some(name.to_string()),
        position,
    }
}

/// A mini-class ride in the given status with the standard fixture figures
/// (5 km / 15 min / fare 150).
pub fn test_ride(status: RideStatus) -> Ride {
    let now = test_epoch();
    Ride {
        id: Uuid::new_v4(),
        rider_id: Uuid::new_v4(),
        driver_id: None,
        status,
        city_code: TEST_CITY.to_string(),
        pickup: test_location("MG Road", test_pickup()),
        drop: test_location("Koramangala", test_drop()),
        ride_class: "mini".to_string(),
        timing_mode: TimingMode::Now,
        scheduled_time: None,
        distance_km: 5.0,
        duration_minutes: 15,
        actual_distance_km: None,
        actual_duration_minutes: None,
        estimated_fare: 150,
        final_fare: None,
        surge_multiplier: 1.0,
        otp: "1234".to_string(),
        payment_method: "cash".to_string(),
        route_polyline: None,
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
    }
}

/// An online driver parked at the test pickup point.
pub fn test_driver() -> DriverProfile {
    let now = test_epoch();
    DriverProfile {
        id: Uuid::new_v4(),
        name: "Ravi".to_string(),
        rating: 4.5,
        availability: Availability::Online,
        city_code: TEST_CITY.to_string(),
        location: Some(test_pickup()),
        heading: None,
        last_location_update: Some(now),
        acceptance_rate: 100.0,
        priority_score: 50.0,
        cancellation_count: 0,
        updated_at: now,
    }
}

/// An open session for the given driver, started at the test epoch.
pub fn test_session(driver_id: Uuid) -> DriverSession {
    let now = test_epoch();
    DriverSession {
        id: Uuid::new_v4(),
        driver_id,
        started_at: now,
        last_heartbeat: now,
        ended_at: None,
        end_reason: None,
        start_location: test_pickup(),
        city_code: TEST_CITY.to_string(),
        app_version: Some("1.4.2".to_string()),
        last_battery_level: Some(0.8),
    }
}

pub fn test_config() -> DispatchConfig {
    DispatchConfig {
        seed: 42,
        ..DispatchConfig::default()
    }
}

/// Everything an integration test needs: the dispatch context plus direct
/// handles on the store and clock behind it.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub dispatch: Dispatch,
}

/// Context with an accept-all responder.
pub fn test_context() -> TestContext {
    test_context_with(Arc::new(ScriptedResponder::accept_all()))
}

pub fn test_context_with(responder: Arc<dyn OfferResponder>) -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(test_epoch()));
    let dispatch = Dispatch::new(
        store.clone(),
        clock.clone(),
        Arc::new(HaversineRouteProvider),
        responder,
        test_config(),
    );
    TestContext {
        store,
        clock,
        dispatch,
    }
}
