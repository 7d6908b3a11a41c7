//! Pluggable route providers: trait abstraction for routing backends.
//!
//! Two implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`HaversineRouteProvider`**: straight-line distance scaled by a road
//!   factor, duration at a flat city speed. Zero dependencies.
//! - **`OsrmRouteProvider`** (feature `osrm`): calls an OSRM HTTP endpoint.
//!
//! Callers hold a `Box<dyn RouteProvider>` built from `RouteProviderKind` at
//! startup; the OSRM provider is wrapped in an LRU cache with haversine
//! fallback so a routing outage degrades to straight-line estimates instead
//! of failing quotes.

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinates};

/// Multiplier from straight-line to road distance when no router answers.
pub const ROAD_DISTANCE_FACTOR: f64 = 1.4;

/// Average in-city speed used for fallback duration estimates (km/h).
pub const FALLBACK_AVG_SPEED_KMH: f64 = 25.0;

/// Result of a route query between two coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteEstimate {
    /// Road-network distance in kilometres.
    pub distance_km: f64,
    /// Travel time in minutes.
    pub duration_minutes: f64,
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Straight-line estimate, zero external dependencies.
    #[default]
    Haversine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

/// Trait for routing backends. Implementations must be `Send + Sync` so one
/// provider can be shared across concurrently running operations.
pub trait RouteProvider: Send + Sync {
    /// Compute a route between two coordinates. Returns `None` if the
    /// backend cannot answer.
    fn route(&self, from: Coordinates, to: Coordinates) -> Option<RouteEstimate>;
}

// ---------------------------------------------------------------------------
// Haversine provider (always available)
// ---------------------------------------------------------------------------

/// Straight-line estimate scaled to road distance. Always answers, which is
/// what makes it usable as the last-resort fallback.
pub fn fallback_route(from: Coordinates, to: Coordinates) -> RouteEstimate {
    let distance_km = haversine_km(from, to) * ROAD_DISTANCE_FACTOR;
    RouteEstimate {
        distance_km,
        duration_minutes: distance_km / FALLBACK_AVG_SPEED_KMH * 60.0,
    }
}

/// Approximates the road network from the great-circle distance.
pub struct HaversineRouteProvider;

impl RouteProvider for HaversineRouteProvider {
    fn route(&self, from: Coordinates, to: Coordinates) -> Option<RouteEstimate> {
        Some(fallback_route(from, to))
    }
}

// ---------------------------------------------------------------------------
// OSRM provider (behind `osrm` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "osrm")]
pub mod osrm {
    use super::*;
    use reqwest::blocking::Client;
    use std::time::Duration;

    /// Routes via an OSRM HTTP endpoint.
    pub struct OsrmRouteProvider {
        client: Client,
        endpoint: String,
    }

    impl OsrmRouteProvider {
        pub fn new(endpoint: &str) -> Self {
            let client = Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build HTTP client");
            Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            }
        }
    }

    /// Minimal OSRM JSON response structures.
    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
    }

    impl RouteProvider for OsrmRouteProvider {
        fn route(&self, from: Coordinates, to: Coordinates) -> Option<RouteEstimate> {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=false",
                self.endpoint, from.lng, from.lat, to.lng, to.lat,
            );

            let resp: OsrmResponse = match self.client.get(&url).send() {
                Ok(r) => match r.json() {
                    Ok(j) => j,
                    Err(_) => return None,
                },
                Err(_) => return None,
            };

            if resp.code != "Ok" {
                return None;
            }

            let route = resp.routes?.into_iter().next()?;
            Some(RouteEstimate {
                distance_km: route.distance / 1000.0,
                duration_minutes: route.duration / 60.0,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Cache key: coordinates quantized to ~1 m so nearby repeat queries hit.
fn cache_key(from: Coordinates, to: Coordinates) -> (i64, i64, i64, i64) {
    let q = |v: f64| (v * 100_000.0).round() as i64;
    (q(from.lat), q(from.lng), q(to.lat), q(to.lng))
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// On cache miss the inner provider is queried; on inner failure the
/// optional haversine fallback is tried before returning `None`.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<(i64, i64, i64, i64), RouteEstimate>>,
    fallback_to_haversine: bool,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize, fallback_to_haversine: bool) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).expect("cache capacity must be > 0"),
            )),
            fallback_to_haversine,
        }
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, from: Coordinates, to: Coordinates) -> Option<RouteEstimate> {
        let key = cache_key(from, to);

        {
            let mut cache = self.cache.lock().ok()?;
            if let Some(cached) = cache.get(&key) {
                return Some(*cached);
            }
        }

        let result = self.inner.route(from, to).or_else(|| {
            if self.fallback_to_haversine {
                HaversineRouteProvider.route(from, to)
            } else {
                None
            }
        });

        if let Some(route) = result {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, route);
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Default route cache capacity for remote providers.
#[cfg(feature = "osrm")]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Construct a boxed [`RouteProvider`] from a [`RouteProviderKind`].
pub fn build_route_provider(kind: &RouteProviderKind) -> Box<dyn RouteProvider> {
    match kind {
        RouteProviderKind::Haversine => Box::new(HaversineRouteProvider),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => {
            let inner = Box::new(osrm::OsrmRouteProvider::new(endpoint));
            Box::new(CachedRouteProvider::new(
                inner,
                DEFAULT_ROUTE_CACHE_CAPACITY,
                true, // degrade to straight-line estimates on OSRM failure
            ))
        }
    }
}
