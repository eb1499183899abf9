//! Navigation alert persistence operations.

use anyhow::{Context, Result};
use nav_core::models::{AlertSeverity, AlertStatus, AlertType, NavigationAlert};
use sqlx::SqlitePool;

use super::db::{format_timestamp, parse_timestamp};

/// Append an alert.
pub async fn insert_alert(pool: &SqlitePool, alert: &NavigationAlert) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO navigation_alerts (
            alert_id, route_id, alert_type, severity, message, location,
            visual_notification, audio_notification, status, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&alert.alert_id)
    .bind(&alert.route_id)
    .bind(format!("{:?}", alert.alert_type))
    .bind(format!("{:?}", alert.severity))
    .bind(&alert.message)
    .bind(serde_json::to_string(&alert.location)?)
    .bind(alert.visual_notification)
    .bind(alert.audio_notification)
    .bind(format!("{:?}", alert.status))
    .bind(format_timestamp(&alert.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all alerts for a route, oldest first.
pub async fn load_alerts_for_route(pool: &SqlitePool, route_id: &str) -> Result<Vec<NavigationAlert>> {
    let rows = sqlx::query_as::<_, AlertRow>(
        r#"
        SELECT alert_id, route_id, alert_type, severity, message, location,
               visual_notification, audio_notification, status, created_at
        FROM navigation_alerts
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
struct AlertRow {
    alert_id: String,
    route_id: String,
    alert_type: String,
    severity: String,
    message: String,
    location: String,
    visual_notification: bool,
    audio_notification: bool,
    status: String,
    created_at: String,
}

impl TryFrom<AlertRow> for NavigationAlert {
    type Error = anyhow::Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        let alert_type = match row.alert_type.as_str() {
            "Obstacle" => AlertType::Obstacle,
            "Weather" => AlertType::Weather,
            "RouteDeviation" => AlertType::RouteDeviation,
            "ReplanFailed" => AlertType::ReplanFailed,
            other => anyhow::bail!("unknown alert type {:?}", other),
        };
        let severity = match row.severity.as_str() {
            "Info" => AlertSeverity::Info,
            "Warning" => AlertSeverity::Warning,
            "High" => AlertSeverity::High,
            "Critical" => AlertSeverity::Critical,
            other => anyhow::bail!("unknown alert severity {:?}", other),
        };
        let status = match row.status.as_str() {
            "Acknowledged" => AlertStatus::Acknowledged,
            "Resolved" => AlertStatus::Resolved,
            "Active" => AlertStatus::Active,
            other => anyhow::bail!("unknown alert status {:?}", other),
        };

        Ok(NavigationAlert {
            location: serde_json::from_str(&row.location).context("alert location")?,
            alert_id: row.alert_id,
            route_id: row.route_id,
            alert_type,
            severity,
            message: row.message,
            visual_notification: row.visual_notification,
            audio_notification: row.audio_notification,
            status,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
