//! Replan history persistence operations.

use anyhow::{Context, Result};
use nav_core::models::RouteReplanHistory;
use sqlx::{Sqlite, SqlitePool};

use super::db::{format_timestamp, parse_timestamp};

/// Insert a replan record within an existing transaction.
pub async fn insert_replan_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    history: &RouteReplanHistory,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_replan_history (
            replan_id, route_id, reason,
            original_waypoints, original_obstacles, new_waypoints,
            trigger_info, autonomous, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&history.replan_id)
    .bind(&history.route_id)
    .bind(&history.reason)
    .bind(serde_json::to_string(&history.original_waypoints)?)
    .bind(serde_json::to_string(&history.original_obstacles)?)
    .bind(serde_json::to_string(&history.new_waypoints)?)
    .bind(serde_json::to_string(&history.trigger)?)
    .bind(history.autonomous)
    .bind(format_timestamp(&history.created_at))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load the replan audit trail for a route, oldest first.
pub async fn load_replans_for_route(pool: &SqlitePool, route_id: &str) -> Result<Vec<RouteReplanHistory>> {
    let rows = sqlx::query_as::<_, ReplanRow>(
        r#"
        SELECT replan_id, route_id, reason, original_waypoints, original_obstacles,
               new_waypoints, trigger_info, autonomous, created_at
        FROM route_replan_history
        WHERE route_id = ?1
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(route_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

#[derive(sqlx::FromRow)]
struct ReplanRow {
    replan_id: String,
    route_id: String,
    reason: String,
    original_waypoints: String,
    original_obstacles: String,
    new_waypoints: String,
    trigger_info: String,
    autonomous: bool,
    created_at: String,
}

impl TryFrom<ReplanRow> for RouteReplanHistory {
    type Error = anyhow::Error;

    fn try_from(row: ReplanRow) -> Result<Self> {
        Ok(RouteReplanHistory {
            original_waypoints: serde_json::from_str(&row.original_waypoints)
                .context("replan original waypoints")?,
            original_obstacles: serde_json::from_str(&row.original_obstacles)
                .context("replan original obstacles")?,
            new_waypoints: serde_json::from_str(&row.new_waypoints).context("replan new waypoints")?,
            trigger: serde_json::from_str(&row.trigger_info).context("replan trigger")?,
            replan_id: row.replan_id,
            route_id: row.route_id,
            reason: row.reason,
            autonomous: row.autonomous,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
