//! Fare arithmetic: estimates, settlement amounts and cancellation fees.
//!
//! Pure functions over a tariff and route figures; surge lookups and store
//! writes stay with the callers.

use serde::Serialize;

use crate::config::{CancellationRule, Tariff};
use crate::routing::RouteEstimate;

/// Itemized quote for one ride class.
#[derive(Debug, Clone, Serialize)]
pub struct FareBreakdown {
    pub ride_class: String,
    pub ride_class_name: String,
    /// Reported to one decimal; the total is computed from the raw figure.
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub base_fare: i64,
    pub distance_charge: i64,
    pub time_charge: i64,
    pub surge_multiplier: f64,
    pub surge_charge: i64,
    pub estimated_fare: i64,
    pub min_fare: i64,
    pub currency: String,
}

/// Quote a fare: base + per-km + per-min, surged, floored at the tariff
/// minimum, rounded to the nearest currency unit.
pub fn estimate_fare(
    class_id: &str,
    tariff: &Tariff,
    currency: &str,
    route: &RouteEstimate,
    surge_multiplier: f64,
) -> FareBreakdown {
    let distance_charge = tariff.per_km * route.distance_km;
    let time_charge = tariff.per_min * route.duration_minutes;
    let subtotal = tariff.base_fare + distance_charge + time_charge;
    let surge_charge = subtotal * (surge_multiplier - 1.0);
    let total = (subtotal * surge_multiplier).max(tariff.min_fare);

    FareBreakdown {
        ride_class: class_id.to_string(),
        ride_class_name: tariff.name.clone(),
        distance_km: (route.distance_km * 10.0).round() / 10.0,
        duration_minutes: route.duration_minutes.round() as i64,
        base_fare: tariff.base_fare.round() as i64,
        distance_charge: distance_charge.round() as i64,
        time_charge: time_charge.round() as i64,
        surge_multiplier,
        surge_charge: surge_charge.round() as i64,
        estimated_fare: total.round() as i64,
        min_fare: tariff.min_fare.round() as i64,
        currency: currency.to_string(),
    }
}

/// Settlement fare after the trip: same formula and floor as the estimate,
/// over actual distance/duration. The tip is added by the caller after the
/// floor, never subject to it.
pub fn final_fare(tariff: &Tariff, distance_km: f64, duration_minutes: f64, surge_multiplier: f64) -> i64 {
    let subtotal =
        tariff.base_fare + tariff.per_km * distance_km + tariff.per_min * duration_minutes;
    (subtotal * surge_multiplier).max(tariff.min_fare).round() as i64
}

/// Fee owed when a ride is cancelled, as a share of the estimated fare.
pub fn cancellation_fee(estimated_fare: i64, rule: &CancellationRule) -> i64 {
    ((estimated_fare as f64) * (rule.fee_percent as f64) / 100.0).round() as i64
}
