//! Environment sample persistence operations.

use anyhow::{Context, Result};
use nav_core::models::{EnvironmentReading, NavigationEnvironment};
use sqlx::SqlitePool;

use super::db::{format_timestamp, parse_timestamp};

/// Append one environment sample.
pub async fn insert_environment(pool: &SqlitePool, sample: &NavigationEnvironment) -> Result<()> {
    let reading = &sample.reading;
    sqlx::query(
        r#"
        INSERT INTO navigation_environment (
            sample_id, route_id, location, weather, sea_state,
            visibility_m, wind_speed_knots, wave_height_m, risk_assessment, sampled_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&sample.sample_id)
    .bind(&sample.route_id)
    .bind(serde_json::to_string(&reading.location)?)
    .bind(serde_json::to_string(&reading.weather)?)
    .bind(serde_json::to_string(&reading.sea_state)?)
    .bind(reading.visibility_m)
    .bind(reading.wind_speed_knots)
    .bind(reading.wave_height_m)
    .bind(serde_json::to_string(&sample.risk_assessment)?)
    .bind(format_timestamp(&sample.timestamp))
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent samples for a route, newest first.
pub async fn load_recent_environment(
    pool: &SqlitePool,
    route_id: &str,
    limit: usize,
) -> Result<Vec<NavigationEnvironment>> {
    let rows = sqlx::query_as::<_, EnvironmentRow>(
        r#"
        SELECT sample_id, route_id, location, weather, sea_state,
               visibility_m, wind_speed_knots, wave_height_m, risk_assessment, sampled_at
        FROM navigation_environment
        WHERE route_id = ?1
        ORDER BY sampled_at DESC, rowid DESC
        LIMIT ?2
        "#,
    )
    .bind(route_id)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    sample_id: String,
    route_id: String,
    location: String,
    weather: String,
    sea_state: String,
    visibility_m: f64,
    wind_speed_knots: f64,
    wave_height_m: f64,
    risk_assessment: String,
    sampled_at: String,
}

impl TryFrom<EnvironmentRow> for NavigationEnvironment {
    type Error = anyhow::Error;

    fn try_from(row: EnvironmentRow) -> Result<Self> {
        Ok(NavigationEnvironment {
            reading: EnvironmentReading {
                location: serde_json::from_str(&row.location).context("sample location")?,
                weather: serde_json::from_str(&row.weather).context("sample weather")?,
                sea_state: serde_json::from_str(&row.sea_state).context("sample sea state")?,
                visibility_m: row.visibility_m,
                wind_speed_knots: row.wind_speed_knots,
                wave_height_m: row.wave_height_m,
            },
            risk_assessment: serde_json::from_str(&row.risk_assessment).context("sample risk")?,
            sample_id: row.sample_id,
            route_id: row.route_id,
            timestamp: parse_timestamp(&row.sampled_at)?,
        })
    }
}
