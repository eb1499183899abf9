//! Autonomous replanning around critical obstacles.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use nav_core::models::{
    AlertSeverity, AlertType, Obstacle, ReplanTrigger, Route, RouteReplanHistory, RouteStatus,
};
use nav_core::{plan_avoidance, AvoidancePlan, MonitoringRules, RouteError};

use crate::alerts::AlertManager;
use crate::backoff::{retry, RetryPolicy};
use crate::monitor::{persist_transition, CycleError};
use crate::persistence::RouteStore;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplanOutcome {
    /// New waypoints were written together with a history row.
    Applied { replan_id: String, attempt: u32, adjusted_orders: Vec<u32> },
    /// No safe alternative; the original waypoints stay in force.
    Failed { reason: String },
    /// `Replanning` could not be persisted, so nothing was attempted.
    Skipped,
}

pub struct Replanner {
    store: Arc<dyn RouteStore>,
    alerts: Arc<AlertManager>,
    rules: MonitoringRules,
    status_retry: RetryPolicy,
}

impl Replanner {
    pub fn new(
        store: Arc<dyn RouteStore>,
        alerts: Arc<AlertManager>,
        rules: MonitoringRules,
        status_retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            alerts,
            rules,
            status_retry,
        }
    }

    /// Replan `route` around the critical obstacles in `obstacles`.
    ///
    /// The route must be `Active`. On return it is `Active` again, unless a
    /// status write failed after retrying or the route was moved on by
    /// someone else, both reported as `CycleError`.
    pub async fn replan(&self, route: &Route, obstacles: &[Obstacle]) -> Result<ReplanOutcome, CycleError> {
        let hazards: Vec<Obstacle> = obstacles.iter().filter(|o| o.is_critical()).cloned().collect();

        match self.set_status(route, route.status, RouteStatus::Replanning).await {
            Ok(()) => {}
            Err(err @ CycleError::StatusChanged { .. }) => return Err(err),
            Err(err) => {
                tracing::error!("Skipping replan of route {}: {}", route.route_id, err);
                return Ok(ReplanOutcome::Skipped);
            }
        }
        tracing::info!(
            "Replanning route {} around {} critical obstacle(s)",
            route.route_id,
            hazards.len()
        );

        match self.compute(route, &hazards) {
            Ok((plan, attempt)) => self.apply(route, obstacles, &hazards, plan, attempt).await,
            Err(err) => self.fail(route, err).await,
        }
    }

    /// Try each attempt with a wider clearance than the last.
    fn compute(&self, route: &Route, hazards: &[Obstacle]) -> Result<(AvoidancePlan, u32), RouteError> {
        let attempts = self.rules.replan_attempts.max(1);
        let mut last_err = RouteError::NoWaypoints;
        for attempt in 1..=attempts {
            let clearance_m = self.rules.clearance_for_attempt(attempt);
            match plan_avoidance(
                &route.waypoints,
                &route.current_position,
                &route.destination,
                hazards,
                clearance_m,
            ) {
                Ok(plan) => return Ok((plan, attempt)),
                Err(err) => {
                    tracing::warn!(
                        "Replan attempt {}/{} for route {} failed (clearance {:.0} m): {}",
                        attempt,
                        attempts,
                        route.route_id,
                        clearance_m,
                        err
                    );
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn apply(
        &self,
        route: &Route,
        obstacles: &[Obstacle],
        hazards: &[Obstacle],
        plan: AvoidancePlan,
        attempt: u32,
    ) -> Result<ReplanOutcome, CycleError> {
        let history = RouteReplanHistory {
            replan_id: Uuid::new_v4().to_string(),
            route_id: route.route_id.clone(),
            reason: replan_reason(hazards),
            original_waypoints: route.waypoints.clone(),
            original_obstacles: obstacles.to_vec(),
            new_waypoints: plan.waypoints,
            trigger: ReplanTrigger {
                obstacle_ids: hazards.iter().map(|h| h.id.clone()).collect(),
                position: route.current_position.clone(),
                autonomy_level: route.autonomy_level,
                attempt,
            },
            autonomous: true,
            created_at: Utc::now(),
        };

        let applied = retry(&self.status_retry, "replan apply", || self.store.apply_replan(&history))
            .await
            .map_err(|source| CycleError::StatusPersist {
                route_id: route.route_id.clone(),
                status: RouteStatus::Active,
                source,
            })?;
        if !applied {
            return Err(CycleError::StatusChanged {
                route_id: route.route_id.clone(),
                expected: RouteStatus::Replanning,
            });
        }

        let message = if plan.adjusted_orders.is_empty() {
            "Route re-verified around critical obstacle; waypoints unchanged".to_string()
        } else {
            format!("Route adjusted around critical obstacle (waypoints {:?})", plan.adjusted_orders)
        };
        if let Err(err) = self
            .alerts
            .create_alert(
                &route.route_id,
                AlertType::RouteDeviation,
                AlertSeverity::Info,
                message,
                route.current_position.point(),
            )
            .await
        {
            tracing::warn!("Failed to raise route deviation alert for {}: {:#}", route.route_id, err);
        }

        tracing::info!("Applied replan {} to route {}", history.replan_id, route.route_id);
        Ok(ReplanOutcome::Applied {
            replan_id: history.replan_id,
            attempt,
            adjusted_orders: plan.adjusted_orders,
        })
    }

    async fn fail(&self, route: &Route, err: RouteError) -> Result<ReplanOutcome, CycleError> {
        let reason = err.to_string();
        tracing::error!("Replan of route {} failed: {}", route.route_id, reason);

        if let Err(alert_err) = self
            .alerts
            .create_alert(
                &route.route_id,
                AlertType::ReplanFailed,
                AlertSeverity::Critical,
                format!("Autonomous replan failed: {}", reason),
                route.current_position.point(),
            )
            .await
        {
            tracing::warn!("Failed to raise replan failure alert for {}: {:#}", route.route_id, alert_err);
        }

        self.set_status(route, RouteStatus::Replanning, RouteStatus::Active).await?;
        Ok(ReplanOutcome::Failed { reason })
    }

    async fn set_status(&self, route: &Route, from: RouteStatus, to: RouteStatus) -> Result<(), CycleError> {
        persist_transition(self.store.as_ref(), &self.status_retry, &route.route_id, from, to).await
    }
}

fn replan_reason(hazards: &[Obstacle]) -> String {
    match hazards {
        [only] => format!(
            "critical {:?} obstacle {} at {:.0} m",
            only.kind, only.id, only.distance_m
        ),
        many => format!("{} critical obstacles detected", many.len()),
    }
}
