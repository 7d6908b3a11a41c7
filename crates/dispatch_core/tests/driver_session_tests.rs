mod support;

use chrono::Duration;
use dispatch_core::domain::{Actor, Availability};
use dispatch_core::error::DispatchError;
use dispatch_core::geo::Coordinates;
use dispatch_core::ops::HeartbeatRequest;
use dispatch_core::store::DispatchStore;
use dispatch_core::test_helpers::{test_context, test_driver, test_pickup};
use support::matched_booking;
use uuid::Uuid;

fn heartbeat_at(position: Coordinates) -> HeartbeatRequest {
    HeartbeatRequest {
        position,
        heading: Some(90.0),
        battery_level: Some(0.74),
        app_version: Some("1.4.2".to_string()),
    }
}

#[test]
fn first_heartbeat_opens_a_session_and_brings_the_driver_online() {
    let ctx = test_context();
    let mut driver = test_driver();
    driver.availability = Availability::Offline;
    driver.location = None;
    let driver_id = driver.id;
    ctx.store.upsert_driver(driver).expect("driver");

    let outcome = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(test_pickup()))
        .expect("heartbeat");
    assert_eq!(outcome.availability, Availability::Online);
    assert!(outcome.active_booking_id.is_none());

    let profile = ctx.store.driver(driver_id).expect("get").expect("driver");
    assert_eq!(profile.location, Some(test_pickup()));
    assert_eq!(profile.heading, Some(90.0));
    assert!(profile.last_location_update.is_some());

    let session = ctx
        .store
        .open_session(driver_id)
        .expect("query")
        .expect("open session");
    assert_eq!(session.id, outcome.session_id);
    assert_eq!(session.start_location, test_pickup());
    assert_eq!(session.last_battery_level, Some(0.74));
}

#[test]
fn later_heartbeats_refresh_the_same_session() {
    let ctx = test_context();
    let driver = test_driver();
    let driver_id = driver.id;
    ctx.store.upsert_driver(driver).expect("driver");

    let first = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(test_pickup()))
        .expect("heartbeat");

    ctx.clock.advance(Duration::minutes(2));
    let moved = Coordinates::new(12.9750, 77.6000);
    let second = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(moved))
        .expect("heartbeat");

    assert_eq!(first.session_id, second.session_id);
    let session = ctx
        .store
        .open_session(driver_id)
        .expect("query")
        .expect("open session");
    assert_eq!(
        session.last_heartbeat,
        session.started_at + Duration::minutes(2)
    );

    // Exactly one open session, ever.
    let open = ctx
        .store
        .sessions_where(&|s| s.driver_id == driver_id && s.is_open())
        .expect("sessions");
    assert_eq!(open.len(), 1);
}

#[test]
fn heartbeat_reports_the_active_booking() {
    let ctx = test_context();
    let (booking_id, _, driver_id, _) = matched_booking(&ctx);

    let outcome = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(test_pickup()))
        .expect("heartbeat");
    assert_eq!(outcome.active_booking_id, Some(booking_id));
    // Assignment made the driver busy; the heartbeat must not undo that.
    assert_eq!(outcome.availability, Availability::Busy);
}

#[test]
fn heartbeats_are_driver_only() {
    let ctx = test_context();
    assert!(matches!(
        ctx.dispatch
            .driver_heartbeat(Some(Actor::Rider(Uuid::new_v4())), heartbeat_at(test_pickup())),
        Err(DispatchError::Unauthorized(_))
    ));
    assert!(matches!(
        ctx.dispatch.driver_heartbeat(None, heartbeat_at(test_pickup())),
        Err(DispatchError::Unauthenticated)
    ));
    assert!(matches!(
        ctx.dispatch
            .driver_heartbeat(Some(Actor::Driver(Uuid::new_v4())), heartbeat_at(test_pickup())),
        Err(DispatchError::NotFound(_))
    ));
}

#[test]
fn reclaimed_driver_comes_back_with_a_new_session() {
    let ctx = test_context();
    let driver = test_driver();
    let driver_id = driver.id;
    ctx.store.upsert_driver(driver).expect("driver");

    let first = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(test_pickup()))
        .expect("heartbeat");

    // Goes silent; reclamation closes the session.
    ctx.clock.advance(Duration::minutes(6));
    ctx.dispatch.run_reclamation().expect("sweep");
    assert_eq!(
        ctx.store
            .driver(driver_id)
            .expect("get")
            .expect("driver")
            .availability,
        Availability::Offline
    );

    // Next heartbeat opens a fresh session and flips them back online.
    let second = ctx
        .dispatch
        .driver_heartbeat(Some(Actor::Driver(driver_id)), heartbeat_at(test_pickup()))
        .expect("heartbeat");
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(second.availability, Availability::Online);
}
