//! Route lifecycle and monitoring control.

use std::sync::Arc;

use thiserror::Error;

use nav_core::models::{
    NavigationAlert, NavigationEnvironment, Route, RouteReplanHistory, RouteRequest, RouteStatus,
};
use nav_core::RouteError;

use crate::alerts::AlertManager;
use crate::config::Config;
use crate::monitor::{CycleError, CycleOutcome, CycleRunner, MonitorExit, RouteMonitorRegistry};

/// How many times a cancel re-reads the route after losing its status write.
const CANCEL_ATTEMPTS: usize = 3;
use crate::persistence::RouteStore;
use crate::sensors::SensorFeed;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("route {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub struct RouteController {
    store: Arc<dyn RouteStore>,
    registry: Arc<RouteMonitorRegistry>,
}

impl RouteController {
    pub fn new(store: Arc<dyn RouteStore>, sensors: Arc<dyn SensorFeed>, config: &Config) -> Self {
        let alerts = Arc::new(AlertManager::new(store.clone(), config.alert_cooldown));
        let runner = Arc::new(CycleRunner::new(
            store.clone(),
            sensors,
            alerts,
            config.rules.clone(),
            config.status_retry.clone(),
        ));
        let registry = Arc::new(RouteMonitorRegistry::new(runner, config.cycle_interval));
        Self { store, registry }
    }

    /// Validate and persist a new route in `Planning`.
    pub async fn create_route(&self, request: RouteRequest) -> Result<Route, ControllerError> {
        let route = Route::new(request)?;
        self.store.insert_route(&route).await?;
        tracing::info!("Created route {} ({})", route.route_id, route.name);
        Ok(route)
    }

    /// Activate `route_id` and (re)start its monitoring task.
    pub async fn start_route_monitoring(&self, route_id: &str) -> Result<Route, ControllerError> {
        let mut route = self.get_route(route_id).await?;
        if route.status == RouteStatus::Planning {
            route.status.transition(RouteStatus::Active)?;
            if self
                .store
                .update_status(route_id, RouteStatus::Planning, RouteStatus::Active)
                .await?
            {
                route.status = RouteStatus::Active;
            } else {
                // Moved on since it was read.
                route = self.get_route(route_id).await?;
            }
        }

        match route.status {
            // Replanning is restored to Active by the first cycle.
            RouteStatus::Active | RouteStatus::Replanning => {}
            status => {
                return Err(RouteError::InvalidTransition { from: status, to: RouteStatus::Active }.into());
            }
        }

        self.registry.start(route_id);
        Ok(route)
    }

    /// Stop monitoring `route_id` after its in-flight cycle. Persisted status
    /// is left as is. Returns whether a task was running.
    pub async fn stop_route_monitoring(&self, route_id: &str) -> bool {
        let stopped = self.registry.stop(route_id).await;
        if stopped {
            tracing::info!("Stopped monitoring route {}", route_id);
        }
        stopped
    }

    /// Move a `Planning` or `Active` route to `Cancelled`, stopping its monitor.
    pub async fn cancel_route(&self, route_id: &str) -> Result<Route, ControllerError> {
        let route = self.get_route(route_id).await?;
        route.status.transition(RouteStatus::Cancelled)?;

        self.registry.stop(route_id).await;

        // The last cycle, or a concurrent start, may have moved the route on.
        for _ in 0..CANCEL_ATTEMPTS {
            let mut route = self.get_route(route_id).await?;
            let from = route.status;
            route.status = from.transition(RouteStatus::Cancelled)?;
            if self.store.update_status(route_id, from, RouteStatus::Cancelled).await? {
                tracing::info!("Cancelled route {}", route_id);
                return Ok(route);
            }
        }
        Err(anyhow::anyhow!("route {} kept changing status while being cancelled", route_id).into())
    }

    pub async fn get_route(&self, route_id: &str) -> Result<Route, ControllerError> {
        self.store
            .get_route(route_id)
            .await?
            .ok_or_else(|| ControllerError::NotFound(route_id.to_string()))
    }

    /// Routes in `Planning`, `Active` or `Replanning`.
    pub async fn get_active_routes(&self) -> Result<Vec<Route>, ControllerError> {
        Ok(self.store.list_routes_by_status(&RouteStatus::OPEN).await?)
    }

    pub async fn get_route_alerts(&self, route_id: &str) -> Result<Vec<NavigationAlert>, ControllerError> {
        self.get_route(route_id).await?;
        Ok(self.store.list_alerts(route_id).await?)
    }

    pub async fn get_replan_history(&self, route_id: &str) -> Result<Vec<RouteReplanHistory>, ControllerError> {
        self.get_route(route_id).await?;
        Ok(self.store.list_replan_history(route_id).await?)
    }

    /// Most recent environment samples, newest first.
    pub async fn get_environment_history(
        &self,
        route_id: &str,
        limit: usize,
    ) -> Result<Vec<NavigationEnvironment>, ControllerError> {
        self.get_route(route_id).await?;
        Ok(self.store.list_environment(route_id, limit).await?)
    }

    /// Run one cycle for `route_id` outside the scheduler. Waits for the
    /// route's monitor to finish any cycle it has in flight.
    pub async fn run_cycle(&self, route_id: &str) -> Result<CycleOutcome, CycleError> {
        self.registry.run_once(route_id).await
    }

    pub fn monitored_routes(&self) -> Vec<String> {
        self.registry.running_routes()
    }

    pub fn is_monitoring(&self, route_id: &str) -> bool {
        self.registry.is_running(route_id)
    }

    pub fn last_monitor_exit(&self, route_id: &str) -> Option<MonitorExit> {
        self.registry.last_exit(route_id)
    }

    /// Restart monitoring for routes left `Active` or `Replanning` by a previous run.
    pub async fn resume_monitoring(&self) -> Result<usize, ControllerError> {
        let routes = self
            .store
            .list_routes_by_status(&[RouteStatus::Active, RouteStatus::Replanning])
            .await?;
        for route in &routes {
            self.registry.start(&route.route_id);
        }
        if !routes.is_empty() {
            tracing::info!("Resumed monitoring for {} route(s)", routes.len());
        }
        Ok(routes.len())
    }

    pub async fn shutdown(&self) {
        self.registry.stop_all().await;
    }
}
