use std::net::SocketAddr;

use fps_relay::config::RelayConfig;
use fps_relay::services::liveness::spawn_liveness_monitor;
use fps_relay::{routes, state};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env().expect("invalid relay configuration");
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let state = state::AppState::new(config);

    // Spawn background heartbeat sweep.
    let liveness = spawn_liveness_monitor(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "fps relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    liveness.abort();
    tracing::info!("fps relay stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
