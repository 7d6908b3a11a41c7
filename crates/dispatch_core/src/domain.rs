//! Core entities shared by every engine: rides, drivers, sessions, match
//! attempts, surge zones, the audit event log, and payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinates;

pub type RideId = Uuid;
pub type RiderId = Uuid;
pub type DriverId = Uuid;
pub type SessionId = Uuid;
pub type AttemptId = Uuid;

/// Lifecycle status of a ride. Transitions are validated by the lifecycle
/// module; terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Idle,
    Searching,
    Scheduled,
    DriverAssigned,
    DriverEnRoute,
    DriverArrived,
    TripStarted,
    TripInProgress,
    TripCompleted,
    PaymentCompleted,
    CancelledByUser,
    CancelledByDriver,
    AutoCancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RideStatus::PaymentCompleted
                | RideStatus::CancelledByUser
                | RideStatus::CancelledByDriver
                | RideStatus::AutoCancelled
        )
    }

    pub fn is_cancellation(self) -> bool {
        matches!(
            self,
            RideStatus::CancelledByUser | RideStatus::CancelledByDriver | RideStatus::AutoCancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Idle => "idle",
            RideStatus::Searching => "searching",
            RideStatus::Scheduled => "scheduled",
            RideStatus::DriverAssigned => "driver_assigned",
            RideStatus::DriverEnRoute => "driver_en_route",
            RideStatus::DriverArrived => "driver_arrived",
            RideStatus::TripStarted => "trip_started",
            RideStatus::TripInProgress => "trip_in_progress",
            RideStatus::TripCompleted => "trip_completed",
            RideStatus::PaymentCompleted => "payment_completed",
            RideStatus::CancelledByUser => "cancelled_by_user",
            RideStatus::CancelledByDriver => "cancelled_by_driver",
            RideStatus::AutoCancelled => "auto_cancelled",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the rider wants the trip to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    Now,
    Tomorrow,
    Scheduled,
}

/// Driver availability. Only ride assignment/release and the session
/// lifecycle may change this; riders never set it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Offline,
    Online,
    Busy,
    OnTrip,
}

/// Who is asking for an operation. `System` is the scheduler and internal
/// workers; everything else must be a ride participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Rider(RiderId),
    Driver(DriverId),
    System,
}

impl Actor {
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::Rider(_) => "rider",
            Actor::Driver(_) => "driver",
            Actor::System => "system",
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::Rider(id) | Actor::Driver(id) => Some(*id),
            Actor::System => None,
        }
    }
}

/// A named pickup or drop point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub short_name: Option<String>,
    pub position: Coordinates,
}

/// One transportation request, from creation to settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub rider_id: RiderId,
    pub driver_id: Option<DriverId>,
    pub status: RideStatus,
    pub city_code: String,
    pub pickup: Location,
    pub drop: Location,
    pub ride_class: String,
    pub timing_mode: TimingMode,
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Route estimate captured from the fare quote at booking time.
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub actual_distance_km: Option<f64>,
    pub actual_duration_minutes: Option<i64>,
    pub estimated_fare: i64,
    /// Settlement amount; doubles as the cancellation-fee amount when the
    /// ride ends in a cancellation with a nonzero fee.
    pub final_fare: Option<i64>,
    pub surge_multiplier: f64,
    /// One-time code the rider reads out to the driver at pickup.
    pub otp: String,
    pub payment_method: String,
    pub route_polyline: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub driver_assigned_at: Option<DateTime<Utc>>,
    pub driver_arrived_at: Option<DateTime<Utc>>,
    pub trip_started_at: Option<DateTime<Utc>>,
    pub trip_completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub scheduled_match_retry_count: u32,
    pub scheduled_match_attempted_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn is_participant(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Rider(id) => self.rider_id == *id,
            Actor::Driver(id) => self.driver_id == Some(*id),
            Actor::System => true,
        }
    }
}

/// A driver as the matcher sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    pub rating: f64,
    pub availability: Availability,
    pub city_code: String,
    pub location: Option<Coordinates>,
    pub heading: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    /// Rolling share of offers accepted, 0–100.
    pub acceptance_rate: f64,
    pub priority_score: f64,
    pub cancellation_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// One driver app session. At most one session per driver has no end time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSession {
    pub id: SessionId,
    pub driver_id: DriverId,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub start_location: Coordinates,
    pub city_code: String,
    pub app_version: Option<String>,
    pub last_battery_level: Option<f64>,
}

impl DriverSession {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// How a pinged driver answered an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferResponse {
    Pending,
    Accepted,
    Rejected,
    Timeout,
}

/// One recorded offer of a ride to one candidate driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAttempt {
    pub id: AttemptId,
    pub ride_id: RideId,
    pub driver_id: DriverId,
    pub attempt_order: u32,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub expires_at: DateTime<Utc>,
    pub response: OfferResponse,
    pub responded_at: Option<DateTime<Utc>>,
    pub was_assigned: bool,
}

/// City-scoped pricing multiplier valid for a bounded window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeZone {
    pub city_code: String,
    pub zone_id: String,
    pub multiplier: f64,
    pub active_requests: u64,
    pub available_drivers: u64,
    pub demand_supply_ratio: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Audit event types. Statuses map onto these via the lifecycle module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideEventType {
    BookingCreated,
    DriverSearchStarted,
    DriverPinged,
    DriverRejected,
    DriverAssigned,
    DriverEnRoute,
    DriverArrived,
    OtpVerified,
    TripStarted,
    TripCompleted,
    PaymentCompleted,
    TripCancelled,
}

impl RideEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            RideEventType::BookingCreated => "booking_created",
            RideEventType::DriverSearchStarted => "driver_search_started",
            RideEventType::DriverPinged => "driver_pinged",
            RideEventType::DriverRejected => "driver_rejected",
            RideEventType::DriverAssigned => "driver_assigned",
            RideEventType::DriverEnRoute => "driver_en_route",
            RideEventType::DriverArrived => "driver_arrived",
            RideEventType::OtpVerified => "otp_verified",
            RideEventType::TripStarted => "trip_started",
            RideEventType::TripCompleted => "trip_completed",
            RideEventType::PaymentCompleted => "payment_completed",
            RideEventType::TripCancelled => "trip_cancelled",
        }
    }
}

/// Append-only audit record. Never mutated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideEvent {
    pub id: Uuid,
    pub ride_id: RideId,
    pub event_type: RideEventType,
    pub actor: Actor,
    pub payload: serde_json::Value,
    pub location: Option<Coordinates>,
    pub recorded_at: DateTime<Utc>,
}

impl RideEvent {
    pub fn record(
        ride_id: RideId,
        event_type: RideEventType,
        actor: Actor,
        payload: serde_json::Value,
        location: Option<Coordinates>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            event_type,
            actor,
            payload,
            location,
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
}

/// A charge raised against the rider: final fares and cancellation fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub ride_id: RideId,
    pub user_id: RiderId,
    pub amount: i64,
    pub method: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_exactly_the_four() {
        let terminal: Vec<_> = [
            RideStatus::Idle,
            RideStatus::Searching,
            RideStatus::Scheduled,
            RideStatus::DriverAssigned,
            RideStatus::DriverEnRoute,
            RideStatus::DriverArrived,
            RideStatus::TripStarted,
            RideStatus::TripInProgress,
            RideStatus::TripCompleted,
            RideStatus::PaymentCompleted,
            RideStatus::CancelledByUser,
            RideStatus::CancelledByDriver,
            RideStatus::AutoCancelled,
        ]
        .into_iter()
        .filter(|s| s.is_terminal())
        .collect();
        assert_eq!(
            terminal,
            vec![
                RideStatus::PaymentCompleted,
                RideStatus::CancelledByUser,
                RideStatus::CancelledByDriver,
                RideStatus::AutoCancelled,
            ]
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&RideStatus::DriverEnRoute).expect("serialize");
        assert_eq!(s, "\"driver_en_route\"");
        assert_eq!(RideStatus::DriverEnRoute.to_string(), "driver_en_route");
    }
}
