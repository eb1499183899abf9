//! In-memory `RouteStore` using DashMap.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use nav_core::models::{
    NavigationAlert, NavigationEnvironment, Obstacle, Position, Route, RouteReplanHistory, RouteStatus,
};

use super::RouteStore;

/// Thread-safe store for routes and their append-only records.
#[derive(Default)]
pub struct MemoryStore {
    routes: DashMap<String, Route>,
    alerts: DashMap<String, Vec<NavigationAlert>>,
    replans: DashMap<String, Vec<RouteReplanHistory>>,
    environment: DashMap<String, Vec<NavigationEnvironment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify_route(&self, route_id: &str, apply: impl FnOnce(&mut Route)) -> bool {
        match self.routes.get_mut(route_id) {
            Some(mut entry) => {
                apply(entry.value_mut());
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn insert_route(&self, route: &Route) -> Result<()> {
        if self.routes.contains_key(&route.route_id) {
            anyhow::bail!("route {} already exists", route.route_id);
        }
        self.routes.insert(route.route_id.clone(), route.clone());
        Ok(())
    }

    async fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        Ok(self.routes.get(route_id).map(|r| r.value().clone()))
    }

    async fn list_routes_by_status(&self, statuses: &[RouteStatus]) -> Result<Vec<Route>> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .filter(|r| statuses.contains(&r.status))
            .map(|r| r.value().clone())
            .collect();
        routes.sort_by_key(|r| r.created_at);
        Ok(routes)
    }

    async fn update_status(&self, route_id: &str, from: RouteStatus, to: RouteStatus) -> Result<bool> {
        let Some(mut route) = self.routes.get_mut(route_id) else {
            return Ok(false);
        };
        if route.status != from {
            return Ok(false);
        }
        route.status = to;
        route.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_position(&self, route_id: &str, position: &Position) -> Result<bool> {
        Ok(self.modify_route(route_id, |route| route.current_position = position.clone()))
    }

    async fn update_obstacles(&self, route_id: &str, obstacles: &[Obstacle]) -> Result<bool> {
        Ok(self.modify_route(route_id, |route| route.obstacles_detected = obstacles.to_vec()))
    }

    async fn apply_replan(&self, history: &RouteReplanHistory) -> Result<bool> {
        // Hold the route entry while appending so both writes land together.
        let Some(mut route) = self.routes.get_mut(&history.route_id) else {
            return Ok(false);
        };
        if route.status != RouteStatus::Replanning {
            return Ok(false);
        }
        self.replans
            .entry(history.route_id.clone())
            .or_default()
            .push(history.clone());
        route.waypoints = history.new_waypoints.clone();
        route.status = RouteStatus::Active;
        route.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_alert(&self, alert: &NavigationAlert) -> Result<()> {
        self.alerts
            .entry(alert.route_id.clone())
            .or_default()
            .push(alert.clone());
        Ok(())
    }

    async fn list_alerts(&self, route_id: &str) -> Result<Vec<NavigationAlert>> {
        Ok(self.alerts.get(route_id).map(|a| a.value().clone()).unwrap_or_default())
    }

    async fn list_replan_history(&self, route_id: &str) -> Result<Vec<RouteReplanHistory>> {
        Ok(self.replans.get(route_id).map(|r| r.value().clone()).unwrap_or_default())
    }

    async fn insert_environment(&self, sample: &NavigationEnvironment) -> Result<()> {
        self.environment
            .entry(sample.route_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn list_environment(&self, route_id: &str, limit: usize) -> Result<Vec<NavigationEnvironment>> {
        Ok(self
            .environment
            .get(route_id)
            .map(|samples| samples.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
