//! Candidate discovery and ranking for the matching engine.

use crate::clock::Clock;
use crate::domain::{Availability, DriverId};
use crate::error::DispatchResult;
use crate::geo::{haversine_km, Coordinates};
use crate::store::DispatchStore;

/// A driver eligible for one specific ride, with the figures the ranking
/// and the offer responder need.
#[derive(Debug, Clone)]
pub struct DriverCandidate {
    pub driver_id: DriverId,
    pub name: String,
    pub rating: f64,
    pub distance_km: f64,
    pub idle_minutes: f64,
    pub acceptance_rate: f64,
    pub priority_score: f64,
    pub location: Coordinates,
}

/// Pickup ETA in whole minutes from the candidate's distance.
pub fn eta_minutes(distance_km: f64, minutes_per_km: f64) -> u32 {
    (distance_km * minutes_per_km).ceil() as u32
}

/// Discover eligible drivers: online, in the ride's city, with a known
/// location, within `radius_km` great-circle distance of the pickup.
/// Returned ranked (see [`rank_candidates`]).
pub fn find_candidates(
    store: &dyn DispatchStore,
    clock: &dyn Clock,
    city_code: &str,
    pickup: Coordinates,
    radius_km: f64,
    default_idle_secs: i64,
) -> DispatchResult<Vec<DriverCandidate>> {
    let now = clock.now();
    let drivers = store.drivers_where(&|d| {
        d.availability == Availability::Online && d.city_code == city_code && d.location.is_some()
    })?;

    let mut candidates = Vec::new();
    for driver in drivers {
        let location = match driver.location {
            Some(location) => location,
            None => continue,
        };
        let distance_km = haversine_km(pickup, location);
        if distance_km > radius_km {
            continue;
        }
        let idle_minutes = match driver.last_location_update {
            Some(at) => ((now - at).num_seconds().max(0) as f64) / 60.0,
            None => default_idle_secs as f64 / 60.0,
        };
        candidates.push(DriverCandidate {
            driver_id: driver.id,
            name: driver.name,
            rating: driver.rating,
            distance_km,
            idle_minutes,
            acceptance_rate: driver.acceptance_rate,
            priority_score: driver.priority_score,
            location,
        });
    }

    rank_candidates(&mut candidates);
    Ok(candidates)
}

/// Rank by priority score descending, tie-broken by distance ascending.
pub fn rank_candidates(candidates: &mut [DriverCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then(a.distance_km.total_cmp(&b.distance_km))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(priority: f64, distance: f64) -> DriverCandidate {
        DriverCandidate {
            driver_id: uuid::Uuid::new_v4(),
            name: "Driver".to_string(),
            rating: 4.5,
            distance_km: distance,
            idle_minutes: 1.0,
            acceptance_rate: 100.0,
            priority_score: priority,
            location: Coordinates::new(0.0, 0.0),
        }
    }

    #[test]
    fn ranking_prefers_priority_then_distance() {
        let mut candidates = vec![
            candidate(50.0, 0.2),
            candidate(80.0, 2.5),
            candidate(80.0, 1.0),
        ];
        rank_candidates(&mut candidates);
        assert_eq!(candidates[0].priority_score, 80.0);
        assert_eq!(candidates[0].distance_km, 1.0);
        assert_eq!(candidates[1].distance_km, 2.5);
        assert_eq!(candidates[2].priority_score, 50.0);
    }

    #[test]
    fn eta_rounds_up_to_whole_minutes() {
        assert_eq!(eta_minutes(0.0, 2.0), 0);
        assert_eq!(eta_minutes(0.4, 2.0), 1);
        assert_eq!(eta_minutes(1.0, 2.0), 2);
        assert_eq!(eta_minutes(2.3, 2.0), 5);
    }
}
