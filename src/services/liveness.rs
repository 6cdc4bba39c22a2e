//! Liveness monitor: periodic heartbeat sweep over every open connection.
//!
//! DESIGN
//! ======
//! One background task for the whole process. Every interval it runs
//! `ConnectionRegistry::probe`: connections that never answered the previous
//! ping are signalled for eviction, the rest get a fresh ping. The first sweep
//! is one full interval after startup, so a connection always has at least one
//! interval to answer before it can be evicted.
//!
//! Eviction only signals the connection task. The task then drops the socket
//! without a close frame and runs the normal disconnect cleanup.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::connection::ProbeReport;
use crate::state::AppState;

/// Spawn the heartbeat task. Returns a handle for shutdown.
pub fn spawn_liveness_monitor(state: AppState) -> JoinHandle<()> {
    let period = state.config.heartbeat_interval;
    info!(interval_secs = period.as_secs(), "liveness monitor configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_probe(&state).await;
        }
    })
}

/// One sweep.
pub async fn run_probe(state: &AppState) -> ProbeReport {
    let report = state.connections.probe().await;
    for player_id in &report.evicted {
        warn!(%player_id, "liveness: no pong since last probe, evicting");
    }
    debug!(pinged = report.pinged, evicted = report.evicted.len(), "liveness sweep");
    report
}

#[cfg(test)]
#[path = "liveness_test.rs"]
mod tests;
