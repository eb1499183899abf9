//! Core data models for route monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RouteError;
use crate::risk::RiskAssessment;
use crate::spatial::bearing_deg;

/// Number of intermediate waypoints synthesised when a route is created without any.
const DEFAULT_INTERMEDIATE_WAYPOINTS: u32 = 3;

/// A geographic point with an optional human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// An ordered intermediate point the route must pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Live position of the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Compass heading in `[0, 360)`
    pub heading_deg: f64,
    pub speed_knots: f64,
}

impl Position {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// Created, not yet monitored
    Planning,
    /// Under active monitoring
    Active,
    /// Autonomous replan in progress
    Replanning,
    /// Arrived at destination
    Completed,
    /// Cancelled by operator
    Cancelled,
}

impl RouteStatus {
    /// Statuses reported by `get_active_routes`.
    pub const OPEN: [RouteStatus; 3] = [Self::Planning, Self::Active, Self::Replanning];

    /// Whether `self -> next` is one of the legal lifecycle edges.
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        use RouteStatus::*;
        matches!(
            (self, next),
            (Planning, Active)
                | (Active, Replanning)
                | (Replanning, Active)
                | (Active, Completed)
                | (Planning, Cancelled)
                | (Active, Cancelled)
        )
    }

    pub fn transition(self, next: RouteStatus) -> Result<RouteStatus, RouteError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RouteError::InvalidTransition { from: self, to: next })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// How much of the replanning decision is automatic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// Replans are proposed to an operator
    Advisory,
    /// Replans are applied and flagged for review
    Supervised,
    /// Replans are applied without operator involvement
    #[default]
    Full,
}

/// The planned path and live state of one monitored transit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub name: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub waypoints: Vec<Waypoint>,
    pub status: RouteStatus,
    pub autonomy_level: AutonomyLevel,
    pub current_position: Position,
    /// Latest obstacle snapshot, replaced wholesale
    #[serde(default)]
    pub obstacles_detected: Vec<Obstacle>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub name: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    /// If omitted, intermediate waypoints are generated along the direct leg.
    #[serde(default)]
    pub waypoints: Option<Vec<Waypoint>>,
    #[serde(default)]
    pub autonomy_level: Option<AutonomyLevel>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Route {
    /// Build a new route in `Planning` from a creation request.
    pub fn new(request: RouteRequest) -> Result<Self, RouteError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(RouteError::EmptyName);
        }
        for point in [&request.origin, &request.destination] {
            if !point.is_valid() {
                return Err(RouteError::InvalidCoordinate { lat: point.lat, lon: point.lon });
            }
        }

        let waypoints = match request.waypoints {
            Some(waypoints) => {
                for wp in &waypoints {
                    if !GeoPoint::new(wp.lat, wp.lon).is_valid() {
                        return Err(RouteError::InvalidCoordinate { lat: wp.lat, lon: wp.lon });
                    }
                }
                validate_waypoints(&waypoints)?;
                waypoints
            }
            None => interpolate_waypoints(
                &request.origin,
                &request.destination,
                DEFAULT_INTERMEDIATE_WAYPOINTS,
            ),
        };

        let origin = request.origin;
        let destination = request.destination;
        let heading_deg = bearing_deg(origin.lat, origin.lon, destination.lat, destination.lon);
        let now = Utc::now();

        Ok(Self {
            route_id: Uuid::new_v4().to_string(),
            name,
            current_position: Position {
                lat: origin.lat,
                lon: origin.lon,
                heading_deg,
                speed_knots: 0.0,
            },
            origin,
            destination,
            waypoints,
            status: RouteStatus::Planning,
            autonomy_level: request.autonomy_level.unwrap_or_default(),
            obstacles_detected: Vec::new(),
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Check that waypoint `order` values are unique and strictly increasing.
pub fn validate_waypoints(waypoints: &[Waypoint]) -> Result<(), RouteError> {
    for pair in waypoints.windows(2) {
        if pair[1].order <= pair[0].order {
            return Err(RouteError::InvalidWaypointOrder {
                previous: pair[0].order,
                current: pair[1].order,
            });
        }
    }
    Ok(())
}

/// Evenly spaced points strictly between `origin` and `destination`.
pub fn interpolate_waypoints(origin: &GeoPoint, destination: &GeoPoint, count: u32) -> Vec<Waypoint> {
    (1..=count)
        .map(|i| {
            let t = f64::from(i) / f64::from(count + 1);
            Waypoint {
                lat: origin.lat + t * (destination.lat - origin.lat),
                lon: origin.lon + t * (destination.lon - origin.lon),
                order: i,
                label: None,
            }
        })
        .collect()
}

// ========== OBSTACLES ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Vessel,
    Debris,
    ShallowWater,
    RestrictedArea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected hazard near the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub lat: f64,
    pub lon: f64,
    pub severity: ObstacleSeverity,
    /// Distance from the vehicle when detected
    pub distance_m: f64,
    pub detected_at: DateTime<Utc>,
}

impl Obstacle {
    pub fn is_critical(&self) -> bool {
        self.severity == ObstacleSeverity::Critical
    }
}

// ========== ALERTS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Obstacle,
    Weather,
    RouteDeviation,
    /// No safe alternative could be computed for a critical hazard
    ReplanFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Acknowledged,
    Resolved,
}

/// Operator-facing alert. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationAlert {
    pub alert_id: String,
    pub route_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub location: GeoPoint,
    pub visual_notification: bool,
    pub audio_notification: bool,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

impl NavigationAlert {
    /// New active alert. Audio is reserved for critical severity.
    pub fn new(
        route_id: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        location: GeoPoint,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            route_id: route_id.into(),
            alert_type,
            severity,
            message: message.into(),
            location,
            visual_notification: true,
            audio_notification: severity == AlertSeverity::Critical,
            status: AlertStatus::Active,
            created_at: Utc::now(),
        }
    }
}

// ========== REPLAN HISTORY ==========

/// What caused an autonomous replan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplanTrigger {
    pub obstacle_ids: Vec<String>,
    pub position: Position,
    pub autonomy_level: AutonomyLevel,
    /// 1-based attempt that produced the applied waypoints
    pub attempt: u32,
}

/// Audit record of one autonomous course change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReplanHistory {
    pub replan_id: String,
    pub route_id: String,
    pub reason: String,
    pub original_waypoints: Vec<Waypoint>,
    pub original_obstacles: Vec<Obstacle>,
    pub new_waypoints: Vec<Waypoint>,
    pub trigger: ReplanTrigger,
    pub autonomous: bool,
    pub created_at: DateTime<Utc>,
}

// ========== ENVIRONMENT ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rainy,
    Stormy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeaState {
    Calm,
    Moderate,
    Rough,
    VeryRough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub condition: WeatherCondition,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeaConditions {
    pub state: SeaState,
    pub wave_height_m: f64,
    pub wave_period_s: f64,
    pub swell_direction_deg: f64,
}

/// Point-in-time environment sample for a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub location: GeoPoint,
    pub weather: WeatherConditions,
    pub sea_state: SeaConditions,
    pub visibility_m: f64,
    pub wind_speed_knots: f64,
    pub wave_height_m: f64,
}

/// Persisted environment sample, one per cycle per route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEnvironment {
    pub sample_id: String,
    pub route_id: String,
    #[serde(flatten)]
    pub reading: EnvironmentReading,
    pub risk_assessment: RiskAssessment,
    pub timestamp: DateTime<Utc>,
}

impl NavigationEnvironment {
    pub fn new(route_id: impl Into<String>, reading: EnvironmentReading, risk: RiskAssessment) -> Self {
        Self {
            sample_id: Uuid::new_v4().to_string(),
            route_id: route_id.into(),
            reading,
            risk_assessment: risk,
            timestamp: Utc::now(),
        }
    }
}
