//! Persistence layer for the route monitor.
//!
//! `RouteStore` is the port the controller talks to. `SqliteStore` backs it
//! with SQLite; `MemoryStore` keeps everything in DashMaps for local runs and tests.

pub mod alerts;
pub mod db;
pub mod environment;
pub mod memory;
pub mod replans;
pub mod routes;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use nav_core::models::{
    NavigationAlert, NavigationEnvironment, Obstacle, Position, Route, RouteReplanHistory, RouteStatus,
};

pub use db::{init_database, Database};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage for routes (get/update by id) and their append-only records.
///
/// Update methods return `Ok(false)` when the route does not exist. Status
/// writes are compare-and-set: they land only while the stored status still
/// equals the caller's expected status, so a route cancelled or completed
/// elsewhere is never moved back.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn insert_route(&self, route: &Route) -> Result<()>;
    async fn get_route(&self, route_id: &str) -> Result<Option<Route>>;
    async fn list_routes_by_status(&self, statuses: &[RouteStatus]) -> Result<Vec<Route>>;

    /// Set `to` if the route is currently `from`; `Ok(false)` otherwise.
    async fn update_status(&self, route_id: &str, from: RouteStatus, to: RouteStatus) -> Result<bool>;
    async fn update_position(&self, route_id: &str, position: &Position) -> Result<bool>;
    async fn update_obstacles(&self, route_id: &str, obstacles: &[Obstacle]) -> Result<bool>;

    /// Append `history`, apply its new waypoints and move the route from
    /// `Replanning` to `Active`, atomically. `Ok(false)` with nothing written
    /// when the route is missing or no longer `Replanning`.
    async fn apply_replan(&self, history: &RouteReplanHistory) -> Result<bool>;

    async fn insert_alert(&self, alert: &NavigationAlert) -> Result<()>;
    async fn list_alerts(&self, route_id: &str) -> Result<Vec<NavigationAlert>>;

    async fn list_replan_history(&self, route_id: &str) -> Result<Vec<RouteReplanHistory>>;

    async fn insert_environment(&self, sample: &NavigationEnvironment) -> Result<()>;
    /// Newest first, at most `limit` samples.
    async fn list_environment(&self, route_id: &str, limit: usize) -> Result<Vec<NavigationEnvironment>>;
}
