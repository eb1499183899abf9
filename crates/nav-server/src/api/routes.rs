//! REST API routes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use nav_core::models::{NavigationAlert, NavigationEnvironment, Route, RouteReplanHistory, RouteRequest};
use nav_core::RouteError;

use crate::controller::{ControllerError, RouteController};
use crate::monitor::MonitorExit;

const DEFAULT_ENVIRONMENT_LIMIT: usize = 20;
const MAX_ENVIRONMENT_LIMIT: usize = 500;

/// Create the API router.
pub fn create_router() -> Router<Arc<RouteController>> {
    Router::new()
        .route("/v1/routes", post(create_route))
        .route("/v1/routes/active", get(list_active_routes))
        .route("/v1/routes/:route_id", get(get_route))
        .route("/v1/routes/:route_id/monitoring", get(get_monitoring))
        .route("/v1/routes/:route_id/monitoring/start", post(start_monitoring))
        .route("/v1/routes/:route_id/monitoring/stop", post(stop_monitoring))
        .route("/v1/routes/:route_id/cancel", post(cancel_route))
        .route("/v1/routes/:route_id/alerts", get(list_alerts))
        .route("/v1/routes/:route_id/replans", get(list_replans))
        .route("/v1/routes/:route_id/environment", get(list_environment))
}

// === Error mapping ===

pub struct ApiError(ControllerError);

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ControllerError::NotFound(_) => StatusCode::NOT_FOUND,
            ControllerError::Route(RouteError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ControllerError::Route(_) => StatusCode::BAD_REQUEST,
            ControllerError::Store(err) => {
                tracing::error!("Store error while serving request: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self.0 {
            ControllerError::Store(_) => "internal storage error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// === Request/Response types ===

#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    pub route_id: String,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exit: Option<MonitorExit>,
}

#[derive(Debug, Deserialize)]
pub struct EnvironmentQuery {
    pub limit: Option<usize>,
}

// === Handlers ===

async fn create_route(
    State(controller): State<Arc<RouteController>>,
    Json(request): Json<RouteRequest>,
) -> ApiResult<(StatusCode, Json<Route>)> {
    let route = controller.create_route(request).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

async fn list_active_routes(State(controller): State<Arc<RouteController>>) -> ApiResult<Json<Vec<Route>>> {
    Ok(Json(controller.get_active_routes().await?))
}

async fn get_route(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Route>> {
    Ok(Json(controller.get_route(&route_id).await?))
}

async fn get_monitoring(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<MonitoringResponse>> {
    controller.get_route(&route_id).await?;
    Ok(Json(monitoring_status(&controller, route_id)))
}

async fn start_monitoring(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Route>> {
    Ok(Json(controller.start_route_monitoring(&route_id).await?))
}

async fn stop_monitoring(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<MonitoringResponse>> {
    controller.get_route(&route_id).await?;
    controller.stop_route_monitoring(&route_id).await;
    Ok(Json(monitoring_status(&controller, route_id)))
}

async fn cancel_route(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Route>> {
    Ok(Json(controller.cancel_route(&route_id).await?))
}

async fn list_alerts(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Vec<NavigationAlert>>> {
    Ok(Json(controller.get_route_alerts(&route_id).await?))
}

async fn list_replans(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
) -> ApiResult<Json<Vec<RouteReplanHistory>>> {
    Ok(Json(controller.get_replan_history(&route_id).await?))
}

async fn list_environment(
    State(controller): State<Arc<RouteController>>,
    Path(route_id): Path<String>,
    Query(query): Query<EnvironmentQuery>,
) -> ApiResult<Json<Vec<NavigationEnvironment>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ENVIRONMENT_LIMIT)
        .clamp(1, MAX_ENVIRONMENT_LIMIT);
    Ok(Json(controller.get_environment_history(&route_id, limit).await?))
}

fn monitoring_status(controller: &RouteController, route_id: String) -> MonitoringResponse {
    MonitoringResponse {
        monitoring: controller.is_monitoring(&route_id),
        last_exit: controller.last_monitor_exit(&route_id),
        route_id,
    }
}
