//! Demand-pressure pricing: periodic recompute of per-city surge zones and
//! the multiplier lookup the fare engine reads.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::config::SurgeConfig;
use crate::domain::{Availability, RideStatus, SurgeZone};
use crate::error::DispatchResult;
use crate::store::DispatchStore;

/// Aggregate result of one recompute pass.
#[derive(Debug, Clone, Serialize)]
pub struct SurgeSummary {
    pub zones_updated: usize,
    pub zones_purged: usize,
    pub zones: Vec<SurgeZone>,
}

/// Pick the multiplier for a demand/supply ratio: first rung (highest ratio
/// first) the ratio meets or exceeds, else 1.0.
pub fn multiplier_for_ratio(config: &SurgeConfig, ratio: f64) -> f64 {
    let mut rungs = config.thresholds.clone();
    rungs.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    rungs
        .iter()
        .find(|t| ratio >= t.ratio)
        .map(|t| t.multiplier)
        .unwrap_or(1.0)
}

/// Highest multiplier among the city's non-expired zones, defaulting to 1.0.
pub fn active_multiplier(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    city_code: &str,
) -> DispatchResult<f64> {
    let now = clock.now();
    let zones = store.zones_where(&|z| z.city_code == city_code && z.valid_until >= now)?;
    Ok(zones
        .iter()
        .map(|z| z.multiplier)
        .fold(1.0, f64::max))
}

/// Recompute the surge zone of every active city and purge expired zones.
///
/// Demand is the count of `searching` rides requested inside the demand
/// window; supply is the count of online drivers, floored at `min_drivers`.
/// Each city gets one upserted `{city}_default` zone with a fresh validity
/// window. Idempotent: re-running on an unchanged store rewrites the same
/// multipliers.
pub fn recompute(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    config: &SurgeConfig,
) -> DispatchResult<SurgeSummary> {
    let now = clock.now();
    let window_start = now - Duration::minutes(config.demand_window_minutes);

    // Active cities: anywhere a driver is registered or a ride is searching.
    let mut cities: BTreeSet<String> = BTreeSet::new();
    for driver in store.drivers_where(&|_| true)? {
        cities.insert(driver.city_code);
    }
    for ride in store.rides_where(&|r| r.status == RideStatus::Searching)? {
        cities.insert(ride.city_code);
    }

    let mut zones = Vec::with_capacity(cities.len());
    for city in cities {
        let active_requests = store.rides_where(&|r| {
            r.status == RideStatus::Searching
                && r.city_code == city
                && r.requested_at >= window_start
        })?;
        let online_drivers = store
            .drivers_where(&|d| d.availability == Availability::Online && d.city_code == city)?;

        let requests = active_requests.len() as u64;
        let drivers = (online_drivers.len() as u64).max(config.min_drivers);
        let ratio = requests as f64 / drivers as f64;
        let multiplier = multiplier_for_ratio(config, ratio);

        let zone = SurgeZone {
            zone_id: format!("{city}_default"),
            city_code: city,
            multiplier,
            active_requests: requests,
            available_drivers: drivers,
            demand_supply_ratio: (ratio * 100.0).round() / 100.0,
            valid_from: now,
            valid_until: now + Duration::minutes(config.validity_minutes),
        };
        store.upsert_zone(zone.clone())?;
        zones.push(zone);
    }

    let zones_purged = store.purge_zones_where(&|z| z.valid_until < now)?;

    info!(
        zones_updated = zones.len(),
        zones_purged, "surge recompute pass finished"
    );

    Ok(SurgeSummary {
        zones_updated: zones.len(),
        zones_purged,
        zones,
    })
}
