//! HTTP surface of the bridge.
//!
//! Each route decodes a JSON request, hands it to exactly one component and
//! encodes the result. Component failures become `{"error": ...}` bodies with
//! a status derived from the error kind.

pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use state::{AppState, SharedState};

/// Build the router with every endpoint, CORS open to all origins.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/files", get(routes::list_files))
        .route(
            "/api/files/*filepath",
            get(routes::read_file)
                .post(routes::write_file)
                .put(routes::write_file)
                .delete(routes::delete_file),
        )
        .route("/api/rename", post(routes::rename))
        .route("/api/execute", post(routes::execute))
        .route("/api/install", post(routes::install))
        .route("/api/git", post(routes::git))
        .route("/api/search", post(routes::search))
        .route("/api/tree", get(routes::tree))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.into_shared())
}

/// Serve the bridge on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(%addr, base_dir = %state.base_dir().display(), "bridge listening");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}
