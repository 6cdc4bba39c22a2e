//! Connection registry: identity, liveness flag, and session binding per socket.
//!
//! DESIGN
//! ======
//! Every accepted websocket gets a random hex identity and an entry here. The
//! entry owns the strong sending half of the connection's outbound queue;
//! session members only hold weak handles to it.
//!
//! LIVENESS
//! ========
//! `probe` is the heartbeat sweep: a connection that has not answered the
//! previous probe is signalled for eviction, every other connection is marked
//! unanswered and sent a new transport ping. A pong flips it back.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Notify, RwLock, mpsc};
use tracing::debug;

use crate::protocol::{GameId, PlayerId};
use crate::state::{Inbox, Outbound, Outbox};

/// Generate a random 16-byte player identity, lowercase hex.
#[must_use]
pub fn generate_player_id() -> PlayerId {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().fold(String::with_capacity(32), |mut id, b| {
        let _ = write!(id, "{b:02x}");
        id
    })
}

/// Handles returned to the connection task on accept.
pub struct Accepted {
    pub player_id: PlayerId,
    pub outbox: Outbox,
    pub inbox: Inbox,
    /// Signalled when the liveness monitor gives up on this connection.
    pub evicted: Arc<Notify>,
}

/// Result of one heartbeat sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub pinged: usize,
    pub evicted: Vec<PlayerId>,
}

struct ConnectionEntry {
    outbox: Outbox,
    alive: bool,
    evicted: Arc<Notify>,
    game_id: Option<GameId>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<PlayerId, ConnectionEntry>>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with a fresh identity and outbound queue.
    pub async fn on_accept(&self) -> Accepted {
        let player_id = generate_player_id();
        let (outbox, inbox) = mpsc::unbounded_channel();
        let evicted = Arc::new(Notify::new());

        let entry = ConnectionEntry { outbox: outbox.clone(), alive: true, evicted: evicted.clone(), game_id: None };
        let mut connections = self.inner.write().await;
        connections.insert(player_id.clone(), entry);
        debug!(%player_id, connections = connections.len(), "connection registered");

        Accepted { player_id, outbox, inbox, evicted }
    }

    /// Record a pong: the connection answered the last probe.
    pub async fn mark_alive(&self, player_id: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(player_id) {
            entry.alive = true;
        }
    }

    /// Bind a connection to a session, returning its previous binding.
    pub async fn bind(&self, player_id: &str, game_id: GameId) -> Option<GameId> {
        let mut connections = self.inner.write().await;
        let entry = connections.get_mut(player_id)?;
        entry.game_id.replace(game_id)
    }

    /// Session the connection is currently bound to, if any.
    pub async fn bound_session(&self, player_id: &str) -> Option<GameId> {
        self.inner
            .read()
            .await
            .get(player_id)
            .and_then(|entry| entry.game_id)
    }

    /// Forget a closed connection. Returns the session it was bound to so the
    /// caller can run session cleanup.
    pub async fn on_close(&self, player_id: &str) -> Option<GameId> {
        let mut connections = self.inner.write().await;
        let entry = connections.remove(player_id)?;
        debug!(%player_id, connections = connections.len(), "connection unregistered");
        entry.game_id
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// One heartbeat sweep. See module docs.
    pub async fn probe(&self) -> ProbeReport {
        let mut report = ProbeReport::default();
        let mut connections = self.inner.write().await;

        for (player_id, entry) in connections.iter_mut() {
            if !entry.alive {
                entry.evicted.notify_one();
                report.evicted.push(player_id.clone());
                continue;
            }

            entry.alive = false;
            if entry.outbox.send(Outbound::Ping).is_ok() {
                report.pinged += 1;
            } else {
                debug!(%player_id, "liveness: outbound queue closed");
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
