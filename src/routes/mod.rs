//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay accepts websocket upgrades at `/`. When a static directory is
//! configured, plain HTTP requests fall through to it so the browser client
//! and the relay share one origin.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router for the relay.
pub fn app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
