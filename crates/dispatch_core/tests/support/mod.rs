#![allow(dead_code)]

use dispatch_core::domain::{Actor, DriverId, RideId, RiderId, TimingMode};
use dispatch_core::ops::CreateBookingRequest;
use dispatch_core::store::DispatchStore;
use dispatch_core::test_helpers::{
    test_driver, test_drop, test_location, test_pickup, TestContext, TEST_CITY,
};
use uuid::Uuid;

/// The standard mini booking request used across flows (5 km / 15 min / 150).
pub fn booking_request() -> CreateBookingRequest {
    CreateBookingRequest {
        pickup: test_location("MG Road", test_pickup()),
        drop: test_location("Koramangala", test_drop()),
        ride_class: "mini".to_string(),
        city_code: TEST_CITY.to_string(),
        timing_mode: TimingMode::Now,
        scheduled_time: None,
        distance_km: 5.0,
        duration_minutes: 15,
        estimated_fare: 150,
        surge_multiplier: Some(1.0),
        route_polyline: None,
        payment_method: Some("cash".to_string()),
    }
}

/// Seed one online driver, create a booking and match it. Panics unless the
/// match succeeds, so flow tests can start from `driver_assigned`.
pub fn matched_booking(ctx: &TestContext) -> (RideId, RiderId, DriverId, String) {
    let rider_id = Uuid::new_v4();
    let driver = test_driver();
    let driver_id = driver.id;
    ctx.store.upsert_driver(driver).expect("seed driver");

    let created = ctx
        .dispatch
        .create_booking(Some(Actor::Rider(rider_id)), booking_request())
        .expect("create booking");
    let outcome = ctx
        .dispatch
        .match_driver(created.booking_id, None, None)
        .expect("match");
    assert!(outcome.matched, "fixture booking should match");
    assert_eq!(outcome.driver_id, Some(driver_id));

    (created.booking_id, rider_id, driver_id, created.otp)
}
