//! Per-cycle position advancement toward the destination.

use serde::{Deserialize, Serialize};

use crate::models::{GeoPoint, Position};
use crate::rules::MonitoringRules;
use crate::spatial::{bearing_deg, haversine_distance, normalize_lon};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub position: Position,
    /// Distance still to go after this step (meters)
    pub remaining_m: f64,
    pub arrived: bool,
}

/// Move `current` a fixed fraction of the remaining distance toward `destination`.
///
/// Within `arrival_epsilon_m` the position snaps onto the destination and
/// speed drops to zero.
pub fn advance_position(current: &Position, destination: &GeoPoint, rules: &MonitoringRules) -> ProgressUpdate {
    let fraction = rules.progress_fraction.clamp(0.0, 1.0);
    let lat = current.lat + (destination.lat - current.lat) * fraction;
    // Step along the shorter way round, which may cross the antimeridian.
    let lon = normalize_lon(current.lon + normalize_lon(destination.lon - current.lon) * fraction);
    let remaining_m = haversine_distance(lat, lon, destination.lat, destination.lon);

    if remaining_m <= rules.arrival_epsilon_m {
        return ProgressUpdate {
            position: Position {
                lat: destination.lat,
                lon: destination.lon,
                heading_deg: current.heading_deg,
                speed_knots: 0.0,
            },
            remaining_m: 0.0,
            arrived: true,
        };
    }

    let min_speed = rules.min_speed_knots.min(rules.max_speed_knots);
    ProgressUpdate {
        position: Position {
            lat,
            lon,
            heading_deg: bearing_deg(lat, lon, destination.lat, destination.lon),
            speed_knots: rules.cruise_speed_knots.clamp(min_speed, rules.max_speed_knots),
        },
        remaining_m,
        arrived: false,
    }
}
