//! Navigation server - route monitoring and autonomous replanning backend

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nav_server::config::Config;
use nav_server::controller::RouteController;
use nav_server::persistence::{self, SqliteStore};
use nav_server::sensors::SimulatedSensorFeed;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("nav_server=debug".parse()?))
        .init();

    tracing::info!("Starting navigation server...");

    let config = Config::from_env();
    let db = persistence::init_database(&config.database_path, config.database_max_connections).await?;
    tracing::info!("Database ready at {}", config.database_path);

    let store = Arc::new(SqliteStore::new(db));
    let sensors = Arc::new(SimulatedSensorFeed::new(config.simulation.clone()));
    let controller = Arc::new(RouteController::new(store, sensors, &config));

    if config.resume_on_start {
        controller.resume_monitoring().await?;
    }

    let app = nav_server::api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(controller.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping route monitors...");
    controller.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
