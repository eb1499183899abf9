//! API routes for the navigation server.

mod routes;

use std::sync::Arc;

use axum::Router;

use crate::controller::RouteController;

pub fn routes() -> Router<Arc<RouteController>> {
    routes::create_router()
}
