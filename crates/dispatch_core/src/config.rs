//! Versioned, immutable configuration: tariffs, cancellation policy, surge
//! thresholds, matching defaults and reclamation timeouts.
//!
//! Loaded once at startup (or built from `Default`, which carries the
//! production constants) and passed explicitly into the engines.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::RideStatus;

/// Pricing for one ride class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    pub name: String,
    pub base_fare: f64,
    pub per_km: f64,
    pub per_min: f64,
    pub min_fare: f64,
}

/// All ride classes offered in a city, keyed by class id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffTable {
    pub version: u32,
    pub currency: String,
    tariffs: BTreeMap<String, Tariff>,
}

impl TariffTable {
    pub fn get(&self, class_id: &str) -> Option<&Tariff> {
        self.tariffs.get(class_id)
    }

    pub fn class_ids(&self) -> impl Iterator<Item = &str> {
        self.tariffs.keys().map(String::as_str)
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        let mut tariffs = BTreeMap::new();
        let mut add = |id: &str, name: &str, base: f64, km: f64, min_rate: f64, floor: f64| {
            tariffs.insert(
                id.to_string(),
                Tariff {
                    name: name.to_string(),
                    base_fare: base,
                    per_km: km,
                    per_min: min_rate,
                    min_fare: floor,
                },
            );
        };
        add("bike", "Bike", 20.0, 8.0, 1.0, 30.0);
        add("auto", "Auto", 30.0, 12.0, 1.5, 40.0);
        add("mini", "Mini", 50.0, 14.0, 2.0, 70.0);
        add("sedan", "Sedan", 80.0, 18.0, 2.5, 100.0);
        add("suv", "SUV", 120.0, 22.0, 3.0, 150.0);
        Self {
            version: 1,
            currency: "INR".to_string(),
            tariffs,
        }
    }
}

/// What cancellation is worth, and who may trigger it, at one status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CancellationRule {
    pub can_cancel: bool,
    pub fee_percent: u32,
    pub rider_may_cancel: bool,
    pub driver_may_cancel: bool,
}

/// Per-status cancellation rules. Fee percentages apply to the estimated
/// fare; the allowed-canceller flags gate who may request the cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationPolicy {
    rules: BTreeMap<RideStatus, CancellationRule>,
}

impl CancellationPolicy {
    pub fn rule_for(&self, status: RideStatus) -> Option<CancellationRule> {
        self.rules.get(&status).copied()
    }
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        let rule = |can: bool, fee: u32, rider: bool, driver: bool| CancellationRule {
            can_cancel: can,
            fee_percent: fee,
            rider_may_cancel: rider,
            driver_may_cancel: driver,
        };
        let mut rules = BTreeMap::new();
        rules.insert(RideStatus::Searching, rule(true, 0, true, false));
        rules.insert(RideStatus::Scheduled, rule(true, 0, true, false));
        rules.insert(RideStatus::DriverAssigned, rule(true, 0, true, true));
        rules.insert(RideStatus::DriverEnRoute, rule(true, 10, true, true));
        rules.insert(RideStatus::DriverArrived, rule(true, 20, true, true));
        rules.insert(RideStatus::TripStarted, rule(false, 50, false, false));
        rules.insert(RideStatus::TripInProgress, rule(false, 100, false, false));
        rules.insert(RideStatus::TripCompleted, rule(false, 100, false, false));
        Self { rules }
    }
}

/// One rung of the surge ladder: at or above `ratio`, charge `multiplier`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SurgeThreshold {
    pub ratio: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeConfig {
    /// Checked highest ratio first; the first rung met wins.
    pub thresholds: Vec<SurgeThreshold>,
    /// Supply floor so an empty city does not divide by zero.
    pub min_drivers: u64,
    pub validity_minutes: i64,
    /// How far back to count demand (`searching` rides).
    pub demand_window_minutes: i64,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![
                SurgeThreshold { ratio: 3.0, multiplier: 2.0 },
                SurgeThreshold { ratio: 2.0, multiplier: 1.5 },
                SurgeThreshold { ratio: 1.5, multiplier: 1.3 },
                SurgeThreshold { ratio: 1.2, multiplier: 1.1 },
            ],
            min_drivers: 1,
            validity_minutes: 10,
            demand_window_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub search_radius_km: f64,
    pub max_attempts: u32,
    pub offer_expiry_secs: i64,
    /// Idle time assumed when a driver has never reported a location update.
    pub default_idle_secs: i64,
    /// Rough in-city pickup speed: minutes of ETA per kilometre.
    pub eta_minutes_per_km: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 3.0,
            max_attempts: 10,
            offer_expiry_secs: 30,
            default_idle_secs: 60,
            eta_minutes_per_km: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    pub session_stale_minutes: i64,
    pub search_timeout_minutes: i64,
    /// Promote scheduled rides whose pickup time is within this window.
    pub promotion_window_minutes: i64,
    pub promotion_retry_cap: u32,
    pub promotion_batch_size: usize,
    pub promotion_radius_km: f64,
    pub promotion_max_attempts: u32,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            session_stale_minutes: 5,
            search_timeout_minutes: 10,
            promotion_window_minutes: 30,
            promotion_retry_cap: 3,
            promotion_batch_size: 20,
            promotion_radius_km: 5.0,
            promotion_max_attempts: 10,
        }
    }
}

/// Top-level configuration handed to the dispatch context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub tariffs: TariffTable,
    #[serde(default)]
    pub cancellation: CancellationPolicy,
    #[serde(default)]
    pub surge: SurgeConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    /// Seed for OTP generation and the simulated offer responder.
    #[serde(default)]
    pub seed: u64,
}

impl DispatchConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tariffs_cover_all_classes() {
        let table = TariffTable::default();
        for id in ["bike", "auto", "mini", "sedan", "suv"] {
            assert!(table.get(id).is_some(), "missing tariff for {id}");
        }
        assert!(table.get("rickshaw").is_none());
    }

    #[test]
    fn cancellation_fee_grows_with_progress() {
        let policy = CancellationPolicy::default();
        let fee = |s| policy.rule_for(s).expect("rule").fee_percent;
        assert_eq!(fee(RideStatus::Searching), 0);
        assert_eq!(fee(RideStatus::DriverEnRoute), 10);
        assert_eq!(fee(RideStatus::DriverArrived), 20);
        assert_eq!(fee(RideStatus::TripStarted), 50);
        assert_eq!(fee(RideStatus::TripInProgress), 100);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DispatchConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: DispatchConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.surge.thresholds.len(), 4);
        assert_eq!(back.tariffs.currency, "INR");
        assert!(back
            .cancellation
            .rule_for(RideStatus::DriverArrived)
            .is_some());
    }

    #[test]
    fn config_loads_from_a_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dispatch.json");
        let mut config = DispatchConfig::default();
        config.seed = 7;
        config.matching.search_radius_km = 4.5;
        std::fs::write(&path, serde_json::to_string(&config).expect("serialize"))
            .expect("write");

        let loaded = DispatchConfig::from_json_file(&path).expect("load");
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.matching.search_radius_km, 4.5);
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let partial: DispatchConfig =
            serde_json::from_str(r#"{ "seed": 99 }"#).expect("deserialize");
        assert_eq!(partial.seed, 99);
        assert_eq!(partial.matching.max_attempts, 10);
        assert_eq!(partial.reclaim.session_stale_minutes, 5);
    }
}
