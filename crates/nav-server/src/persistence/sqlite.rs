//! SQLite-backed `RouteStore`.

use anyhow::Result;
use async_trait::async_trait;
use nav_core::models::{
    NavigationAlert, NavigationEnvironment, Obstacle, Position, Route, RouteReplanHistory, RouteStatus,
};

use super::{alerts, environment, replans, routes, Database, RouteStore};

#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RouteStore for SqliteStore {
    async fn insert_route(&self, route: &Route) -> Result<()> {
        routes::insert_route(self.db.pool(), route).await
    }

    async fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        routes::load_route(self.db.pool(), route_id).await
    }

    async fn list_routes_by_status(&self, statuses: &[RouteStatus]) -> Result<Vec<Route>> {
        routes::load_routes_by_status(self.db.pool(), statuses).await
    }

    async fn update_status(&self, route_id: &str, from: RouteStatus, to: RouteStatus) -> Result<bool> {
        routes::update_status(self.db.pool(), route_id, from, to).await
    }

    async fn update_position(&self, route_id: &str, position: &Position) -> Result<bool> {
        routes::update_position(self.db.pool(), route_id, position).await
    }

    async fn update_obstacles(&self, route_id: &str, obstacles: &[Obstacle]) -> Result<bool> {
        routes::update_obstacles(self.db.pool(), route_id, obstacles).await
    }

    async fn apply_replan(&self, history: &RouteReplanHistory) -> Result<bool> {
        routes::apply_replan(self.db.pool(), history).await
    }

    async fn insert_alert(&self, alert: &NavigationAlert) -> Result<()> {
        alerts::insert_alert(self.db.pool(), alert).await
    }

    async fn list_alerts(&self, route_id: &str) -> Result<Vec<NavigationAlert>> {
        alerts::load_alerts_for_route(self.db.pool(), route_id).await
    }

    async fn list_replan_history(&self, route_id: &str) -> Result<Vec<RouteReplanHistory>> {
        replans::load_replans_for_route(self.db.pool(), route_id).await
    }

    async fn insert_environment(&self, sample: &NavigationEnvironment) -> Result<()> {
        environment::insert_environment(self.db.pool(), sample).await
    }

    async fn list_environment(&self, route_id: &str, limit: usize) -> Result<Vec<NavigationEnvironment>> {
        environment::load_recent_environment(self.db.pool(), route_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use chrono::Utc;
    use nav_core::models::{
        AlertSeverity, AlertType, GeoPoint, ObstacleKind, ObstacleSeverity, ReplanTrigger, RouteRequest,
        SeaConditions, SeaState, WeatherCondition, WeatherConditions, Waypoint,
    };
    use nav_core::{EnvironmentReading, RiskAssessment};

    async fn store() -> SqliteStore {
        SqliteStore::new(init_database(":memory:", 1).await.unwrap())
    }

    fn route() -> Route {
        Route::new(RouteRequest {
            name: "Hampton Roads transit".to_string(),
            origin: GeoPoint::new(36.95, -76.33).with_label("Norfolk"),
            destination: GeoPoint::new(37.26, -76.02),
            waypoints: None,
            autonomy_level: None,
            created_by: Some("ops".to_string()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn route_round_trips_and_updates() {
        let store = store().await;
        let route = route();
        store.insert_route(&route).await.unwrap();

        let loaded = store.get_route(&route.route_id).await.unwrap().unwrap();
        assert_eq!(loaded.name, route.name);
        assert_eq!(loaded.status, RouteStatus::Planning);
        assert_eq!(loaded.waypoints, route.waypoints);
        assert_eq!(loaded.origin.label.as_deref(), Some("Norfolk"));

        assert!(store.update_status(&route.route_id, RouteStatus::Planning, RouteStatus::Active).await.unwrap());
        let moved = Position { lat: 37.0, lon: -76.2, heading_deg: 45.0, speed_knots: 12.0 };
        assert!(store.update_position(&route.route_id, &moved).await.unwrap());
        let obstacles = vec![Obstacle {
            id: "obs-1".to_string(),
            kind: ObstacleKind::Debris,
            lat: 37.01,
            lon: -76.21,
            severity: ObstacleSeverity::High,
            distance_m: 900.0,
            detected_at: Utc::now(),
        }];
        assert!(store.update_obstacles(&route.route_id, &obstacles).await.unwrap());

        let loaded = store.get_route(&route.route_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RouteStatus::Active);
        assert_eq!(loaded.current_position, moved);
        assert_eq!(loaded.obstacles_detected, obstacles);

        assert!(!store.update_status("missing", RouteStatus::Planning, RouteStatus::Active).await.unwrap());
        assert!(store.get_route("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let store = store().await;
        let planning = route();
        let active = route();
        let done = route();
        for r in [&planning, &active, &done] {
            store.insert_route(r).await.unwrap();
        }
        store.update_status(&active.route_id, RouteStatus::Planning, RouteStatus::Active).await.unwrap();
        store.update_status(&done.route_id, RouteStatus::Planning, RouteStatus::Cancelled).await.unwrap();

        let open = store.list_routes_by_status(&RouteStatus::OPEN).await.unwrap();
        let ids: Vec<&str> = open.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(open.len(), 2);
        assert!(ids.contains(&planning.route_id.as_str()));
        assert!(ids.contains(&active.route_id.as_str()));
        assert!(store.list_routes_by_status(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_replan_is_atomic() {
        let store = store().await;
        let route = route();
        store.insert_route(&route).await.unwrap();
        store.update_status(&route.route_id, RouteStatus::Planning, RouteStatus::Active).await.unwrap();
        store.update_status(&route.route_id, RouteStatus::Active, RouteStatus::Replanning).await.unwrap();

        let new_waypoints: Vec<Waypoint> = route
            .waypoints
            .iter()
            .map(|wp| Waypoint { lon: wp.lon - 0.01, ..wp.clone() })
            .collect();
        let history = RouteReplanHistory {
            replan_id: "replan-1".to_string(),
            route_id: route.route_id.clone(),
            reason: "critical vessel ahead".to_string(),
            original_waypoints: route.waypoints.clone(),
            original_obstacles: Vec::new(),
            new_waypoints: new_waypoints.clone(),
            trigger: ReplanTrigger {
                obstacle_ids: vec!["obs-1".to_string()],
                position: route.current_position.clone(),
                autonomy_level: route.autonomy_level,
                attempt: 1,
            },
            autonomous: true,
            created_at: Utc::now(),
        };
        assert!(store.apply_replan(&history).await.unwrap());

        let loaded = store.get_route(&route.route_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RouteStatus::Active);
        assert_eq!(loaded.waypoints, new_waypoints);

        let replans = store.list_replan_history(&route.route_id).await.unwrap();
        assert_eq!(replans.len(), 1);
        assert!(replans[0].autonomous);
        assert_eq!(replans[0].original_waypoints, route.waypoints);

        // The route is Active again, so a second apply writes nothing.
        let again = RouteReplanHistory { replan_id: "replan-2".to_string(), ..history.clone() };
        assert!(!store.apply_replan(&again).await.unwrap());
        assert_eq!(store.list_replan_history(&route.route_id).await.unwrap().len(), 1);

        let orphan = RouteReplanHistory { replan_id: "replan-3".to_string(), route_id: "missing".to_string(), ..history };
        assert!(!store.apply_replan(&orphan).await.unwrap());
        assert!(store.list_replan_history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_rows_are_rejected() {
        let store = store().await;
        let route = route();
        store.insert_route(&route).await.unwrap();

        sqlx::query("UPDATE routes SET autonomy_level = 'Autopilot' WHERE route_id = ?1")
            .bind(&route.route_id)
            .execute(store.db.pool())
            .await
            .unwrap();
        assert!(store.get_route(&route.route_id).await.is_err());

        sqlx::query("UPDATE routes SET autonomy_level = 'Full', created_at = 'not a time' WHERE route_id = ?1")
            .bind(&route.route_id)
            .execute(store.db.pool())
            .await
            .unwrap();
        assert!(store.get_route(&route.route_id).await.is_err());

        let alert = NavigationAlert::new(
            &route.route_id,
            AlertType::Weather,
            AlertSeverity::Warning,
            "squall",
            GeoPoint::new(37.0, -76.2),
        );
        store.insert_alert(&alert).await.unwrap();
        sqlx::query("UPDATE navigation_alerts SET status = 'Snoozed'")
            .execute(store.db.pool())
            .await
            .unwrap();
        assert!(store.list_alerts(&route.route_id).await.is_err());
    }

    #[tokio::test]
    async fn status_write_requires_expected_status() {
        let store = store().await;
        let route = route();
        store.insert_route(&route).await.unwrap();
        store.update_status(&route.route_id, RouteStatus::Planning, RouteStatus::Active).await.unwrap();
        store.update_status(&route.route_id, RouteStatus::Active, RouteStatus::Cancelled).await.unwrap();

        // A writer still holding the old Active status loses.
        assert!(!store.update_status(&route.route_id, RouteStatus::Active, RouteStatus::Replanning).await.unwrap());
        assert!(!store.update_status(&route.route_id, RouteStatus::Active, RouteStatus::Completed).await.unwrap());
        let loaded = store.get_route(&route.route_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RouteStatus::Cancelled);
    }

    #[tokio::test]
    async fn alerts_and_environment_are_append_only() {
        let store = store().await;
        let route = route();
        store.insert_route(&route).await.unwrap();

        let location = GeoPoint::new(37.0, -76.2);
        for severity in [AlertSeverity::Info, AlertSeverity::Critical] {
            let alert = NavigationAlert::new(&route.route_id, AlertType::Obstacle, severity, "debris", location.clone());
            store.insert_alert(&alert).await.unwrap();
        }
        let alerts = store.list_alerts(&route.route_id).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(!alerts[0].audio_notification);
        assert!(alerts[1].audio_notification);
        assert_eq!(alerts[1].severity, AlertSeverity::Critical);

        for wave_height_m in [1.0, 2.0, 3.5] {
            let reading = EnvironmentReading {
                location: location.clone(),
                weather: WeatherConditions {
                    condition: WeatherCondition::Rainy,
                    temperature_c: 14.0,
                    humidity_pct: 88.0,
                    precipitation_mm: 2.5,
                },
                sea_state: SeaConditions {
                    state: SeaState::Rough,
                    wave_height_m,
                    wave_period_s: 7.0,
                    swell_direction_deg: 200.0,
                },
                visibility_m: 4_000.0,
                wind_speed_knots: 18.0,
                wave_height_m,
            };
            let sample = NavigationEnvironment::new(&route.route_id, reading, RiskAssessment::default());
            store.insert_environment(&sample).await.unwrap();
        }
        let recent = store.list_environment(&route.route_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].reading.wave_height_m, 3.5);
        assert_eq!(recent[0].reading.weather.condition, WeatherCondition::Rainy);
    }
}
