pub mod error;
pub mod models;
pub mod progress;
pub mod replan;
pub mod risk;
pub mod rules;
pub mod spatial;

pub use error::RouteError;
pub use models::{
    AlertSeverity, AlertStatus, AlertType, AutonomyLevel, EnvironmentReading, GeoPoint,
    NavigationAlert, NavigationEnvironment, Obstacle, ObstacleKind, ObstacleSeverity, Position,
    ReplanTrigger, Route, RouteReplanHistory, RouteRequest, RouteStatus, SeaConditions, SeaState,
    WeatherCondition, WeatherConditions, Waypoint,
};
pub use progress::{advance_position, ProgressUpdate};
pub use replan::{plan_avoidance, AvoidancePlan};
pub use risk::{assess_risk, RiskAssessment, RiskFactor, RiskFactorKind, RiskLevel};
pub use rules::MonitoringRules;
pub use spatial::haversine_distance;
