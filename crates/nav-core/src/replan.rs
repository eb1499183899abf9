//! Obstacle-avoidance waypoint planning.
//!
//! Produces an alternative waypoint sequence that keeps every waypoint
//! clear of the supplied hazards. The number of waypoints and their `order`
//! values never change; only coordinates move.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::models::{GeoPoint, Obstacle, Position, Waypoint};
use crate::spatial::{bearing, haversine_distance, offset_by_bearing, project_onto_leg};

/// Extra distance beyond the clearance radius when moving a waypoint.
const PUSH_MARGIN: f64 = 0.05;
/// A waypoint may move at most this many clearance radii from where it was.
const MAX_DEVIATION_FACTOR: f64 = 5.0;
/// Below this distance a hazard is treated as sitting on the waypoint.
const COINCIDENT_M: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidancePlan {
    pub waypoints: Vec<Waypoint>,
    /// Orders of the waypoints that were moved
    pub adjusted_orders: Vec<u32>,
}

impl AvoidancePlan {
    pub fn is_unchanged(&self) -> bool {
        self.adjusted_orders.is_empty()
    }
}

/// Compute waypoints that keep at least `clearance_m` from every hazard.
///
/// The next waypoint ahead of the vehicle is deflected sideways when the
/// current leg passes a hazard; any waypoint inside a hazard's clearance
/// radius is then pushed radially out of it.
pub fn plan_avoidance(
    waypoints: &[Waypoint],
    position: &Position,
    destination: &GeoPoint,
    hazards: &[Obstacle],
    clearance_m: f64,
) -> Result<AvoidancePlan, RouteError> {
    if waypoints.is_empty() {
        return Err(RouteError::NoWaypoints);
    }

    let mut planned = waypoints.to_vec();
    let push_m = clearance_m * (1.0 + PUSH_MARGIN);

    if let Some(next) = next_waypoint_ahead(&planned, position, destination) {
        deflect_leg(&mut planned[next], position, hazards, clearance_m, push_m);
    }

    for wp in planned.iter_mut() {
        for hazard in hazards {
            let distance = haversine_distance(hazard.lat, hazard.lon, wp.lat, wp.lon);
            if distance >= clearance_m {
                continue;
            }
            let away = if distance < COINCIDENT_M {
                bearing(position.lat, position.lon, wp.lat, wp.lon) + FRAC_PI_2
            } else {
                bearing(hazard.lat, hazard.lon, wp.lat, wp.lon)
            };
            let (lat, lon) = offset_by_bearing(hazard.lat, hazard.lon, push_m, away);
            wp.lat = lat;
            wp.lon = lon;
        }
    }

    let max_deviation_m = clearance_m * MAX_DEVIATION_FACTOR;
    let mut adjusted_orders = Vec::new();
    for (original, moved) in waypoints.iter().zip(&planned) {
        for hazard in hazards {
            if haversine_distance(hazard.lat, hazard.lon, moved.lat, moved.lon) < clearance_m {
                return Err(RouteError::NoSafeAlternative { hazard_id: hazard.id.clone() });
            }
        }
        let deviation = haversine_distance(original.lat, original.lon, moved.lat, moved.lon);
        if deviation > max_deviation_m {
            let hazard_id = nearest_hazard(hazards, original).unwrap_or_default();
            return Err(RouteError::NoSafeAlternative { hazard_id });
        }
        if deviation > f64::EPSILON {
            adjusted_orders.push(moved.order);
        }
    }

    Ok(AvoidancePlan { waypoints: planned, adjusted_orders })
}

/// Index of the first waypoint closer to the destination than the vehicle.
fn next_waypoint_ahead(waypoints: &[Waypoint], position: &Position, destination: &GeoPoint) -> Option<usize> {
    let remaining = haversine_distance(position.lat, position.lon, destination.lat, destination.lon);
    waypoints.iter().position(|wp| {
        haversine_distance(wp.lat, wp.lon, destination.lat, destination.lon) < remaining
    })
}

/// Slide `wp` sideways, away from the first hazard the leg passes too closely.
fn deflect_leg(wp: &mut Waypoint, position: &Position, hazards: &[Obstacle], clearance_m: f64, push_m: f64) {
    let blocking = hazards.iter().find_map(|hazard| {
        let projection = project_onto_leg(hazard.lat, hazard.lon, position.lat, position.lon, wp.lat, wp.lon);
        let ahead = projection.along > 0.0 && projection.along < 1.0;
        (ahead && projection.distance_m < clearance_m).then_some(projection)
    });
    let Some(projection) = blocking else {
        return;
    };

    let leg_bearing = bearing(position.lat, position.lon, wp.lat, wp.lon);
    // Hazard on the left: turn right. Otherwise (right or dead ahead) turn left.
    let sideways = if projection.side > 0.0 {
        leg_bearing + FRAC_PI_2
    } else {
        leg_bearing - FRAC_PI_2
    };
    let (lat, lon) = offset_by_bearing(wp.lat, wp.lon, push_m, sideways);
    wp.lat = lat;
    wp.lon = lon;
}

fn nearest_hazard(hazards: &[Obstacle], wp: &Waypoint) -> Option<String> {
    hazards
        .iter()
        .map(|h| (haversine_distance(h.lat, h.lon, wp.lat, wp.lon), h))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, h)| h.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{validate_waypoints, ObstacleKind, ObstacleSeverity};
    use crate::spatial::meters_per_deg_lat;
    use chrono::Utc;

    const BASE_LAT: f64 = 36.0;
    const BASE_LON: f64 = -75.0;

    fn north_of_base(meters: f64) -> f64 {
        BASE_LAT + meters / meters_per_deg_lat(BASE_LAT)
    }

    fn hazard(id: &str, lat: f64, lon: f64) -> Obstacle {
        Obstacle {
            id: id.to_string(),
            kind: ObstacleKind::Vessel,
            lat,
            lon,
            severity: ObstacleSeverity::Critical,
            distance_m: 0.0,
            detected_at: Utc::now(),
        }
    }

    fn position() -> Position {
        Position { lat: BASE_LAT, lon: BASE_LON, heading_deg: 0.0, speed_knots: 10.0 }
    }

    /// Straight route due north with waypoints every 5 km.
    fn northbound() -> (Vec<Waypoint>, GeoPoint) {
        let waypoints = (1..=3)
            .map(|i| Waypoint {
                lat: north_of_base(5_000.0 * f64::from(i)),
                lon: BASE_LON,
                order: i * 10,
                label: None,
            })
            .collect();
        (waypoints, GeoPoint::new(north_of_base(20_000.0), BASE_LON))
    }

    #[test]
    fn hazard_on_waypoint_is_cleared_and_order_preserved() {
        let (waypoints, destination) = northbound();
        let hazards = vec![hazard("h1", waypoints[1].lat, waypoints[1].lon + 0.001)];

        let plan = plan_avoidance(&waypoints, &position(), &destination, &hazards, 1_000.0).unwrap();

        assert_eq!(plan.waypoints.len(), waypoints.len());
        let orders: Vec<u32> = plan.waypoints.iter().map(|w| w.order).collect();
        assert_eq!(orders, vec![10, 20, 30]);
        assert!(validate_waypoints(&plan.waypoints).is_ok());
        assert_eq!(plan.adjusted_orders, vec![20]);

        let moved = &plan.waypoints[1];
        let clearance = haversine_distance(hazards[0].lat, hazards[0].lon, moved.lat, moved.lon);
        assert!(clearance >= 1_000.0, "clearance was {clearance}");
        // Hazard sits east of the waypoint, so it is pushed west.
        assert!(moved.lon < waypoints[1].lon);
    }

    #[test]
    fn leg_through_hazard_deflects_next_waypoint() {
        let (waypoints, destination) = northbound();
        // Dead ahead on the first leg, 2.5 km out, far from any waypoint.
        let hazards = vec![hazard("h1", north_of_base(2_500.0), BASE_LON + 0.0005)];

        let plan = plan_avoidance(&waypoints, &position(), &destination, &hazards, 1_000.0).unwrap();

        assert_eq!(plan.adjusted_orders, vec![10]);
        // Hazard is slightly east (right of the leg), so the waypoint slides west.
        assert!(plan.waypoints[0].lon < BASE_LON);
        assert_eq!(plan.waypoints[1], waypoints[1]);
        assert_eq!(plan.waypoints[2], waypoints[2]);
    }

    #[test]
    fn clear_route_is_unchanged() {
        let (waypoints, destination) = northbound();
        let hazards = vec![hazard("far", BASE_LAT, BASE_LON + 0.5)];

        let plan = plan_avoidance(&waypoints, &position(), &destination, &hazards, 1_000.0).unwrap();

        assert!(plan.is_unchanged());
        assert_eq!(plan.waypoints, waypoints);
    }

    #[test]
    fn empty_route_cannot_be_replanned() {
        let (_, destination) = northbound();
        let err = plan_avoidance(&[], &position(), &destination, &[hazard("h", 0.0, 0.0)], 1_000.0).unwrap_err();
        assert_eq!(err, RouteError::NoWaypoints);
    }

    #[test]
    fn dense_hazard_field_has_no_safe_alternative() {
        // A chain of hazards every kilometre would drag the waypoint far off course.
        let wp = vec![Waypoint { lat: north_of_base(100.0), lon: BASE_LON, order: 1, label: None }];
        // Vehicle is past the waypoint, so only radial pushes apply.
        let destination = GeoPoint::new(north_of_base(-50_000.0), BASE_LON);
        let hazards: Vec<Obstacle> = (0..=10)
            .map(|k| hazard(&format!("h{k}"), north_of_base(1_000.0 * f64::from(k)), BASE_LON))
            .collect();
        let far_position = Position { lat: north_of_base(-20_000.0), ..position() };

        for clearance in [1_000.0, 1_500.0] {
            let err = plan_avoidance(&wp, &far_position, &destination, &hazards, clearance).unwrap_err();
            assert!(matches!(err, RouteError::NoSafeAlternative { .. }), "clearance {clearance}: {err:?}");
        }
    }
}
