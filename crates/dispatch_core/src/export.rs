//! Audit log export for offline analysis.

use std::fs::File;
use std::path::Path;

use crate::domain::RideEvent;
use crate::store::DispatchStore;

fn all_events_sorted(store: &dyn DispatchStore) -> Result<Vec<RideEvent>, Box<dyn std::error::Error>> {
    let mut events = store.events_where(&|_| true)?;
    events.sort_by_key(|e| e.recorded_at);
    Ok(events)
}

/// Write the full event log as pretty-printed JSON. Returns the number of
/// events written.
pub fn export_events_json(
    store: &dyn DispatchStore,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let events = all_events_sorted(store)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &events)?;
    Ok(events.len())
}

/// Write the full event log as CSV, one row per event with the payload as a
/// JSON string column. Returns the number of events written.
pub fn export_events_csv(
    store: &dyn DispatchStore,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let events = all_events_sorted(store)?;
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "id",
        "ride_id",
        "event_type",
        "actor_kind",
        "actor_id",
        "lat",
        "lng",
        "recorded_at",
        "payload",
    ])?;

    for event in &events {
        wtr.write_record([
            &event.id.to_string(),
            &event.ride_id.to_string(),
            event.event_type.as_str(),
            event.actor.kind(),
            &event
                .actor
                .id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            &event
                .location
                .map(|l| l.lat.to_string())
                .unwrap_or_default(),
            &event
                .location
                .map(|l| l.lng.to_string())
                .unwrap_or_default(),
            &event.recorded_at.to_rfc3339(),
            &event.payload.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(events.len())
}
