mod support;

use dispatch_core::domain::{Actor, RideStatus};
use dispatch_core::export::{export_events_csv, export_events_json};
use dispatch_core::ops::CancelRequest;
use dispatch_core::store::DispatchStore;
use dispatch_core::test_helpers::test_context;
use support::matched_booking;

#[test]
fn json_export_round_trips_the_event_log() {
    let ctx = test_context();
    let (booking_id, rider_id, _, _) = matched_booking(&ctx);
    ctx.dispatch
        .cancel(
            Some(Actor::Rider(rider_id)),
            CancelRequest {
                booking_id,
                reason: None,
                location: None,
            },
        )
        .expect("cancel");

    let expected = ctx
        .store
        .events_where(&|_| true)
        .expect("events")
        .len();
    assert!(expected >= 5, "flow should have produced a full audit trail");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ride_events.json");
    let written = export_events_json(&*ctx.store, &path).expect("export");
    assert_eq!(written, expected);

    let data = std::fs::read_to_string(&path).expect("read back");
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&data).expect("parse");
    assert_eq!(parsed.len(), expected);
    assert!(parsed
        .iter()
        .any(|e| e["event_type"] == "driver_assigned"));
    assert!(parsed
        .iter()
        .any(|e| e["event_type"] == "trip_cancelled"));
}

#[test]
fn csv_export_writes_one_row_per_event_plus_header() {
    let ctx = test_context();
    let ride = dispatch_core::test_helpers::test_ride(RideStatus::Searching);
    let id = ride.id;
    ctx.store.insert_ride(ride).expect("insert");
    ctx.dispatch.match_driver(id, None, None).expect("match"); // zero candidates event

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ride_events.csv");
    let written = export_events_csv(&*ctx.store, &path).expect("export");
    assert_eq!(written, 1);

    let data = std::fs::read_to_string(&path).expect("read back");
    let lines: Vec<_> = data.lines().collect();
    assert_eq!(lines.len(), written + 1);
    assert!(lines[0].starts_with("id,ride_id,event_type"));
    assert!(lines[1].contains("driver_search_started"));
    assert!(lines[1].contains("system"));
}
