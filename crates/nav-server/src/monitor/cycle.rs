//! One monitoring cycle for one route.
//!
//! sample -> assess -> scan -> alert -> (replan) -> advance.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use nav_core::models::{
    AlertSeverity, AlertType, GeoPoint, NavigationEnvironment, Obstacle, ObstacleSeverity, Route, RouteStatus,
};
use nav_core::{advance_position, assess_risk, MonitoringRules, RiskAssessment, RiskLevel, RouteError};

use crate::alerts::AlertManager;
use crate::backoff::{retry, RetryPolicy};
use crate::persistence::RouteStore;
use crate::replanner::{ReplanOutcome, Replanner};
use crate::sensors::SensorFeed;

/// Why a route's monitoring task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum MonitorExit {
    /// `stop` was requested or the monitor was replaced
    Stopped,
    RouteMissing,
    RouteInactive(RouteStatus),
    FetchError(String),
}

#[derive(Debug, Error)]
pub enum CycleError {
    /// A status transition could not be written after retrying.
    #[error("failed to persist status {status:?} for route {route_id}: {source:#}")]
    StatusPersist {
        route_id: String,
        status: RouteStatus,
        #[source]
        source: anyhow::Error,
    },

    /// The stored status was no longer `expected` when the write landed;
    /// someone else moved the route on.
    #[error("route {route_id} is no longer {expected:?}")]
    StatusChanged { route_id: String, expected: RouteStatus },

    #[error(transparent)]
    Transition(#[from] RouteError),
}

/// What a completed cycle did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// `None` when the environment sample failed
    pub risk: Option<RiskLevel>,
    pub obstacles_detected: usize,
    pub alerts_raised: usize,
    pub replan: Option<ReplanOutcome>,
    pub arrived: bool,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Continue(CycleReport),
    Halt(MonitorExit),
}

/// Write a status transition, checking the edge first and retrying the write.
///
/// The write only lands while the stored status is still `from`; otherwise
/// (including a deleted route) it fails with `StatusChanged` and is not retried.
pub(crate) async fn persist_transition(
    store: &dyn RouteStore,
    policy: &RetryPolicy,
    route_id: &str,
    from: RouteStatus,
    to: RouteStatus,
) -> Result<(), CycleError> {
    from.transition(to)?;
    let written = retry(policy, "route status update", || store.update_status(route_id, from, to))
        .await
        .map_err(|source| CycleError::StatusPersist {
            route_id: route_id.to_string(),
            status: to,
            source,
        })?;
    if !written {
        return Err(CycleError::StatusChanged {
            route_id: route_id.to_string(),
            expected: from,
        });
    }
    Ok(())
}

/// Everything a cycle needs; shared by all monitored routes.
pub struct CycleRunner {
    store: Arc<dyn RouteStore>,
    sensors: Arc<dyn SensorFeed>,
    alerts: Arc<AlertManager>,
    replanner: Replanner,
    rules: MonitoringRules,
    status_retry: RetryPolicy,
}

impl CycleRunner {
    pub fn new(
        store: Arc<dyn RouteStore>,
        sensors: Arc<dyn SensorFeed>,
        alerts: Arc<AlertManager>,
        rules: MonitoringRules,
        status_retry: RetryPolicy,
    ) -> Self {
        let replanner = Replanner::new(store.clone(), alerts.clone(), rules.clone(), status_retry.clone());
        Self {
            store,
            sensors,
            alerts,
            replanner,
            rules,
            status_retry,
        }
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Run one cycle. Callers must not run two cycles for the same route at
    /// once; the registry serialises them.
    pub async fn run_cycle(&self, route_id: &str) -> Result<CycleOutcome, CycleError> {
        let route = match self.store.get_route(route_id).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                tracing::warn!("Route {} no longer exists; halting monitor", route_id);
                return Ok(CycleOutcome::Halt(MonitorExit::RouteMissing));
            }
            Err(err) => {
                tracing::error!("Failed to load route {}: {:#}", route_id, err);
                return Ok(CycleOutcome::Halt(MonitorExit::FetchError(err.to_string())));
            }
        };

        match self.run_loaded(route).await {
            Err(CycleError::StatusChanged { expected, .. }) => {
                tracing::info!("Route {} left {:?} during its cycle", route_id, expected);
                Ok(self.after_status_change(route_id).await)
            }
            other => other,
        }
    }

    async fn run_loaded(&self, mut route: Route) -> Result<CycleOutcome, CycleError> {
        let route_id = route.route_id.clone();
        match route.status {
            RouteStatus::Active => {}
            RouteStatus::Replanning => {
                // Left over from a cycle whose final status write failed.
                tracing::warn!("Route {} found in Replanning; restoring Active", route_id);
                self.transition(&route, RouteStatus::Active).await?;
                route.status = RouteStatus::Active;
            }
            status => {
                tracing::info!("Route {} is {:?}; halting monitor", route_id, status);
                return Ok(CycleOutcome::Halt(MonitorExit::RouteInactive(status)));
            }
        }

        tracing::debug!("Monitoring cycle for route {}", route_id);
        let mut report = CycleReport::default();

        let risk = self.sample_environment(&route).await;
        report.risk = risk.as_ref().map(|r| r.overall);

        let obstacles = self.detect_obstacles(&route).await;
        report.obstacles_detected = obstacles.len();

        report.alerts_raised = self.raise_cycle_alerts(&route, risk.as_ref(), &obstacles).await;

        if obstacles.iter().any(Obstacle::is_critical) {
            report.replan = Some(self.replanner.replan(&route, &obstacles).await?);
        }

        report.arrived = self.advance(&route).await?;
        Ok(CycleOutcome::Continue(report))
    }

    /// A status write lost to another writer: halt unless the route is still open.
    async fn after_status_change(&self, route_id: &str) -> CycleOutcome {
        match self.store.get_route(route_id).await {
            Ok(Some(route)) if route.status.is_terminal() || route.status == RouteStatus::Planning => {
                CycleOutcome::Halt(MonitorExit::RouteInactive(route.status))
            }
            Ok(Some(_)) => CycleOutcome::Continue(CycleReport::default()),
            Ok(None) => CycleOutcome::Halt(MonitorExit::RouteMissing),
            Err(err) => CycleOutcome::Halt(MonitorExit::FetchError(err.to_string())),
        }
    }

    async fn sample_environment(&self, route: &Route) -> Option<RiskAssessment> {
        let reading = match self.sensors.sample(&route.current_position).await {
            Ok(reading) => reading,
            Err(err) => {
                tracing::warn!("Environment sample failed for route {}: {:#}", route.route_id, err);
                return None;
            }
        };

        let risk = assess_risk(&reading, &self.rules);
        let sample = NavigationEnvironment::new(&route.route_id, reading, risk.clone());
        if let Err(err) = self.store.insert_environment(&sample).await {
            tracing::warn!("Failed to persist environment for route {}: {:#}", route.route_id, err);
        }
        Some(risk)
    }

    async fn detect_obstacles(&self, route: &Route) -> Vec<Obstacle> {
        let obstacles = match self.sensors.scan(&route.current_position).await {
            Ok(obstacles) => obstacles,
            Err(err) => {
                tracing::warn!("Obstacle scan failed for route {}: {:#}", route.route_id, err);
                return Vec::new();
            }
        };

        if !obstacles.is_empty() {
            if let Err(err) = self.store.update_obstacles(&route.route_id, &obstacles).await {
                tracing::warn!("Failed to persist obstacles for route {}: {:#}", route.route_id, err);
            }
        }
        obstacles
    }

    async fn raise_cycle_alerts(
        &self,
        route: &Route,
        risk: Option<&RiskAssessment>,
        obstacles: &[Obstacle],
    ) -> usize {
        let mut raised = 0;

        for obstacle in obstacles {
            let severity = match obstacle.severity {
                ObstacleSeverity::Critical => AlertSeverity::Critical,
                ObstacleSeverity::High => AlertSeverity::High,
                _ => continue,
            };
            let message = format!(
                "{:?} obstacle ({:?}) detected {:.0} m from vessel",
                obstacle.severity, obstacle.kind, obstacle.distance_m
            );
            let location = GeoPoint::new(obstacle.lat, obstacle.lon);
            match self
                .alerts
                .raise(&route.route_id, AlertType::Obstacle, severity, message, location)
                .await
            {
                Ok(Some(_)) => raised += 1,
                Ok(None) => {}
                Err(err) => tracing::warn!("Failed to raise obstacle alert for route {}: {:#}", route.route_id, err),
            }
        }

        if let Some(risk) = risk.filter(|r| r.overall == RiskLevel::High) {
            let factors: Vec<String> = risk.factors.iter().map(|f| format!("{:?}", f.factor)).collect();
            let message = format!("High environmental risk: {}", factors.join(", "));
            match self
                .alerts
                .raise(
                    &route.route_id,
                    AlertType::Weather,
                    AlertSeverity::Warning,
                    message,
                    route.current_position.point(),
                )
                .await
            {
                Ok(Some(_)) => raised += 1,
                Ok(None) => {}
                Err(err) => tracing::warn!("Failed to raise weather alert for route {}: {:#}", route.route_id, err),
            }
        }

        raised
    }

    /// Move the vehicle along; returns whether it arrived.
    async fn advance(&self, route: &Route) -> Result<bool, CycleError> {
        let update = advance_position(&route.current_position, &route.destination, &self.rules);
        if let Err(err) = self.store.update_position(&route.route_id, &update.position).await {
            tracing::warn!("Failed to persist position for route {}: {:#}", route.route_id, err);
            return Ok(false);
        }

        if update.arrived {
            self.transition(route, RouteStatus::Completed).await?;
            tracing::info!("Route {} arrived at destination", route.route_id);
        } else {
            tracing::debug!("Route {} has {:.0} m to go", route.route_id, update.remaining_m);
        }
        Ok(update.arrived)
    }

    async fn transition(&self, route: &Route, to: RouteStatus) -> Result<(), CycleError> {
        persist_transition(self.store.as_ref(), &self.status_retry, &route.route_id, route.status, to).await
    }
}
