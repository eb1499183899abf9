//! Route persistence operations.

use anyhow::{Context, Result};
use chrono::Utc;
use nav_core::models::{AutonomyLevel, Obstacle, Position, Route, RouteReplanHistory, RouteStatus};
use sqlx::SqlitePool;

use super::db::{format_timestamp, parse_timestamp};
use super::replans::insert_replan_tx;

/// Insert a newly created route.
pub async fn insert_route(pool: &SqlitePool, route: &Route) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO routes (
            route_id, name, origin, destination, waypoints,
            status, autonomy_level, current_position, obstacles_detected,
            created_by, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&route.route_id)
    .bind(&route.name)
    .bind(serde_json::to_string(&route.origin)?)
    .bind(serde_json::to_string(&route.destination)?)
    .bind(serde_json::to_string(&route.waypoints)?)
    .bind(format!("{:?}", route.status))
    .bind(format!("{:?}", route.autonomy_level))
    .bind(serde_json::to_string(&route.current_position)?)
    .bind(serde_json::to_string(&route.obstacles_detected)?)
    .bind(&route.created_by)
    .bind(format_timestamp(&route.created_at))
    .bind(format_timestamp(&route.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a single route by ID.
pub async fn load_route(pool: &SqlitePool, route_id: &str) -> Result<Option<Route>> {
    let row = sqlx::query_as::<_, RouteRow>(&format!("{} WHERE route_id = ?1", SELECT_ROUTES))
        .bind(route_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(r) => Ok(Some(r.try_into()?)),
        None => Ok(None),
    }
}

/// Load every route whose status is one of `statuses`.
pub async fn load_routes_by_status(pool: &SqlitePool, statuses: &[RouteStatus]) -> Result<Vec<Route>> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (1..=statuses.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "{} WHERE status IN ({}) ORDER BY created_at ASC",
        SELECT_ROUTES, placeholders
    );

    let mut query = sqlx::query_as::<_, RouteRow>(&sql);
    for status in statuses {
        query = query.bind(format!("{:?}", status));
    }
    let rows = query.fetch_all(pool).await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Move a route from `from` to `to`. Returns false if the route does not
/// exist or its stored status is no longer `from`.
pub async fn update_status(pool: &SqlitePool, route_id: &str, from: RouteStatus, to: RouteStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE routes SET status = ?3, updated_at = ?4 WHERE route_id = ?1 AND status = ?2")
        .bind(route_id)
        .bind(format!("{:?}", from))
        .bind(format!("{:?}", to))
        .bind(format_timestamp(&Utc::now()))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_position(pool: &SqlitePool, route_id: &str, position: &Position) -> Result<bool> {
    let result = sqlx::query("UPDATE routes SET current_position = ?2, updated_at = ?3 WHERE route_id = ?1")
        .bind(route_id)
        .bind(serde_json::to_string(position)?)
        .bind(format_timestamp(&Utc::now()))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the obstacle snapshot wholesale.
pub async fn update_obstacles(pool: &SqlitePool, route_id: &str, obstacles: &[Obstacle]) -> Result<bool> {
    let result = sqlx::query("UPDATE routes SET obstacles_detected = ?2, updated_at = ?3 WHERE route_id = ?1")
        .bind(route_id)
        .bind(serde_json::to_string(obstacles)?)
        .bind(format_timestamp(&Utc::now()))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Record a replan and switch the route onto its new waypoints in one transaction.
///
/// The route moves from `Replanning` back to `Active`. Either every write
/// lands or none do; returns false, writing nothing, if the route is missing
/// or not `Replanning`.
pub async fn apply_replan(pool: &SqlitePool, history: &RouteReplanHistory) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE routes SET waypoints = ?2, status = ?3, updated_at = ?4 WHERE route_id = ?1 AND status = ?5",
    )
    .bind(&history.route_id)
    .bind(serde_json::to_string(&history.new_waypoints)?)
    .bind(format!("{:?}", RouteStatus::Active))
    .bind(format_timestamp(&Utc::now()))
    .bind(format!("{:?}", RouteStatus::Replanning))
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    insert_replan_tx(&mut tx, history).await?;
    tx.commit().await?;
    Ok(true)
}

const SELECT_ROUTES: &str = "SELECT route_id, name, origin, destination, waypoints, status, autonomy_level, \
     current_position, obstacles_detected, created_by, created_at, updated_at FROM routes";

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct RouteRow {
    route_id: String,
    name: String,
    origin: String,
    destination: String,
    waypoints: String,
    status: String,
    autonomy_level: String,
    current_position: String,
    obstacles_detected: String,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RouteRow> for Route {
    type Error = anyhow::Error;

    fn try_from(row: RouteRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "Planning" => RouteStatus::Planning,
            "Active" => RouteStatus::Active,
            "Replanning" => RouteStatus::Replanning,
            "Completed" => RouteStatus::Completed,
            "Cancelled" => RouteStatus::Cancelled,
            other => anyhow::bail!("unknown route status {:?} for {}", other, row.route_id),
        };

        let autonomy_level = match row.autonomy_level.as_str() {
            "Advisory" => AutonomyLevel::Advisory,
            "Supervised" => AutonomyLevel::Supervised,
            "Full" => AutonomyLevel::Full,
            other => anyhow::bail!("unknown autonomy level {:?} for {}", other, row.route_id),
        };

        Ok(Route {
            origin: serde_json::from_str(&row.origin).context("route origin")?,
            destination: serde_json::from_str(&row.destination).context("route destination")?,
            waypoints: serde_json::from_str(&row.waypoints).context("route waypoints")?,
            current_position: serde_json::from_str(&row.current_position).context("route position")?,
            obstacles_detected: serde_json::from_str(&row.obstacles_detected).context("route obstacles")?,
            status,
            autonomy_level,
            route_id: row.route_id,
            name: row.name,
            created_by: row.created_by,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
