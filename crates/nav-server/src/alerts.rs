//! Alert creation with per-location debouncing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use tokio::time::Instant;

use nav_core::models::{AlertSeverity, AlertType, GeoPoint, NavigationAlert};

use crate::persistence::RouteStore;

/// Size of the grid cell that counts as "the same place" for debouncing (degrees).
const LOCATION_BUCKET_DEG: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlertKey {
    route_id: String,
    alert_type: AlertType,
    lat_bucket: i64,
    lon_bucket: i64,
}

impl AlertKey {
    fn new(route_id: &str, alert_type: AlertType, location: &GeoPoint) -> Self {
        Self {
            route_id: route_id.to_string(),
            alert_type,
            lat_bucket: (location.lat / LOCATION_BUCKET_DEG).round() as i64,
            lon_bucket: (location.lon / LOCATION_BUCKET_DEG).round() as i64,
        }
    }
}

pub struct AlertManager {
    store: Arc<dyn RouteStore>,
    cooldown: Duration,
    last_raised: DashMap<AlertKey, Instant>,
}

impl AlertManager {
    pub fn new(store: Arc<dyn RouteStore>, cooldown: Duration) -> Self {
        Self {
            store,
            cooldown,
            last_raised: DashMap::new(),
        }
    }

    /// Persist a new active alert unconditionally.
    pub async fn create_alert(
        &self,
        route_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        location: GeoPoint,
    ) -> Result<NavigationAlert> {
        let alert = NavigationAlert::new(route_id, alert_type, severity, message, location);
        self.store.insert_alert(&alert).await?;
        tracing::info!(
            "Alert {:?}/{:?} on route {}: {}",
            alert.alert_type,
            alert.severity,
            alert.route_id,
            alert.message
        );
        Ok(alert)
    }

    /// Like `create_alert`, but suppressed when the same alert type was raised
    /// for the same route and location bucket within the cooldown.
    ///
    /// Returns `None` when suppressed.
    pub async fn raise(
        &self,
        route_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        location: GeoPoint,
    ) -> Result<Option<NavigationAlert>> {
        let key = AlertKey::new(route_id, alert_type, &location);
        if self.in_cooldown(&key) {
            tracing::debug!("Suppressed repeat {:?} alert for route {}", alert_type, route_id);
            return Ok(None);
        }

        let alert = self
            .create_alert(route_id, alert_type, severity, message, location)
            .await?;
        self.last_raised.insert(key, Instant::now());
        Ok(Some(alert))
    }

    /// Drop debounce state for a route that is no longer monitored.
    pub fn forget_route(&self, route_id: &str) {
        self.last_raised.retain(|key, _| key.route_id != route_id);
    }

    fn in_cooldown(&self, key: &AlertKey) -> bool {
        if self.cooldown.is_zero() {
            return false;
        }
        self.last_raised
            .get(key)
            .is_some_and(|last| last.elapsed() < self.cooldown)
    }
}
