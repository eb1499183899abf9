//! Domain errors for route validation and replanning.

use thiserror::Error;

use crate::models::RouteStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// Waypoint `order` values must be unique and strictly increasing.
    #[error("waypoint order must be strictly increasing (order {current} follows {previous})")]
    InvalidWaypointOrder { previous: u32, current: u32 },

    #[error("invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("route name must not be empty")]
    EmptyName,

    #[error("illegal status transition {from:?} -> {to:?}")]
    InvalidTransition { from: RouteStatus, to: RouteStatus },

    #[error("route has no waypoints to replan")]
    NoWaypoints,

    #[error("no safe alternative clears hazard {hazard_id}")]
    NoSafeAlternative { hazard_id: String },
}
