//! Cardlink Server - presence, invite and two-player relay for the card game.
//!
//! A pure Axum server: one WebSocket endpoint carries the relay protocol and
//! a handful of HTTP routes expose diagnostics and app-link files.

use anyhow::Context;
use axum::{http::Method, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod relay;
mod routes;
mod state;
mod ws;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardlink_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let addr = config.listen_addr();
    tracing::info!("Serving app-link files from {}", config.well_known_dir.display());
    let state = AppState::new(config);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        // WebSocket (plain GETs answer "OK")
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        // Diagnostics
        .route("/invites", get(routes::invites::list_pending))
        .route("/debug", get(routes::debug::debug_report))
        // App links
        .route(
            "/.well-known/apple-app-site-association",
            get(routes::well_known::apple_app_site_association),
        )
        .route("/.well-known/assetlinks.json", get(routes::well_known::assetlinks))
        .fallback(routes::fallback)
        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
