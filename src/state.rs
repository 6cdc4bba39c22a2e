//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the two process-wide registries: live connections keyed by player
//! identity, and live sessions keyed by game id. Each `Session` owns its
//! members and their positions as a paired map so the two never drift.
//!
//! Members hold only a weak handle to their connection's outbound queue.
//! The connection registry owns the strong handle; once a connection is gone,
//! sends to its member silently fail until cleanup removes it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::protocol::{
    Color, GameId, INITIAL_HEALTH, PlayerId, PlayerSnapshot, Position, RosterEntry, ServerMessage, palette_color,
};
use crate::services::connection::ConnectionRegistry;
use crate::services::session::SessionRegistry;

// =============================================================================
// OUTBOUND
// =============================================================================

/// Item queued for delivery on one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON message for the client.
    Message(ServerMessage),
    /// Transport-level liveness probe.
    Ping,
}

/// Strong sending half of a connection's outbound queue. Unbounded: a
/// recipient that stalls accumulates backlog rather than losing messages.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Receiving half drained by the connection task.
pub type Inbox = mpsc::UnboundedReceiver<Outbound>;

// =============================================================================
// MEMBER
// =============================================================================

/// One participant bound to a session.
#[derive(Debug, Clone)]
pub struct Member {
    /// Weak back-reference to the connection's outbound queue.
    pub outbox: mpsc::WeakUnboundedSender<Outbound>,
    pub color: Color,
    /// Carried in snapshots; no handler mutates it.
    pub health: i32,
    /// Carried in snapshots; no handler mutates it.
    pub alive: bool,
}

impl Member {
    #[must_use]
    pub fn new(outbox: &Outbox, color: Color) -> Self {
        Self { outbox: outbox.downgrade(), color, health: INITIAL_HEALTH, alive: true }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One isolated match instance.
#[derive(Debug)]
pub struct Session {
    pub id: GameId,
    /// Creator of the session; sole authority to start it.
    pub host_id: PlayerId,
    members: HashMap<PlayerId, Member>,
    positions: HashMap<PlayerId, Position>,
    next_color_index: usize,
    started: bool,
}

impl Session {
    /// Create a session whose only member is the host, colored `PALETTE[0]`.
    #[must_use]
    pub fn new(id: GameId, host_id: PlayerId, host_outbox: &Outbox, position: Position) -> Self {
        let mut members = HashMap::new();
        members.insert(host_id.clone(), Member::new(host_outbox, palette_color(0)));
        let mut positions = HashMap::new();
        positions.insert(host_id.clone(), position);
        Self { id, host_id, members, positions, next_color_index: 1, started: false }
    }

    /// Insert a member and its position. Assigns `PALETTE[next_color_index % 8]`
    /// and advances the counter; colors are never recycled.
    pub fn add_member(&mut self, player_id: PlayerId, outbox: &Outbox, position: Position) -> Color {
        let color = palette_color(self.next_color_index);
        self.next_color_index += 1;
        self.positions.insert(player_id.clone(), position);
        self.members.insert(player_id, Member::new(outbox, color));
        color
    }

    /// Remove a member and its position. Returns false if it was not present.
    pub fn remove_member(&mut self, player_id: &str) -> bool {
        self.positions.remove(player_id);
        self.members.remove(player_id).is_some()
    }

    /// Overwrite a member's position. Ignored for non-members.
    pub fn set_position(&mut self, player_id: &str, position: Position) -> bool {
        match self.positions.get_mut(player_id) {
            Some(slot) => {
                *slot = position;
                true
            }
            None => false,
        }
    }

    /// Flip the session into the started state. Only the host can, and only once.
    pub fn start(&mut self, sender: &str) -> bool {
        if self.started || sender != self.host_id {
            return false;
        }
        self.started = true;
        true
    }

    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn next_color_index(&self) -> usize {
        self.next_color_index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, player_id: &str) -> bool {
        self.members.contains_key(player_id)
    }

    #[must_use]
    pub fn member(&self, player_id: &str) -> Option<&Member> {
        self.members.get(player_id)
    }

    #[must_use]
    pub fn position(&self, player_id: &str) -> Option<Position> {
        self.positions.get(player_id).copied()
    }

    pub fn members(&self) -> impl Iterator<Item = (&PlayerId, &Member)> {
        self.members.iter()
    }

    /// Every current member, for a `gameState` broadcast.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.members
            .iter()
            .map(|(id, member)| PlayerSnapshot {
                id: id.clone(),
                position: self.position(id).unwrap_or_default(),
                color: member.color,
                health: member.health,
                is_alive: member.alive,
            })
            .collect()
    }

    /// Every member except `exclude`, with host flags, for a `gameJoined` reply.
    #[must_use]
    pub fn roster_excluding(&self, exclude: &str) -> Vec<RosterEntry> {
        self.members
            .iter()
            .filter(|(id, _)| id.as_str() != exclude)
            .map(|(id, member)| RosterEntry {
                id: id.clone(),
                position: self.position(id).unwrap_or_default(),
                color: member.color,
                health: member.health,
                is_alive: member.alive,
                is_host: *id == self.host_id,
            })
            .collect()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub connections: ConnectionRegistry,
    pub sessions: SessionRegistry,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { config: Arc::new(config), connections: ConnectionRegistry::new(), sessions: SessionRegistry::new() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use std::time::Duration;

    use tokio::time::timeout;

    /// Create a test `AppState` with default config and empty registries.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(RelayConfig::default())
    }

    /// Create a standalone outbound queue.
    #[must_use]
    pub fn test_outbox() -> (Outbox, Inbox) {
        mpsc::unbounded_channel()
    }

    #[must_use]
    pub fn origin() -> Position {
        Position::new(0.0, 0.0, 0.0)
    }

    /// Receive the next queued message, failing on timeout or on a ping.
    pub async fn recv_message(rx: &mut Inbox) -> ServerMessage {
        let item = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("outbound receive timed out")
            .expect("outbound channel closed unexpectedly");
        match item {
            Outbound::Message(msg) => msg,
            Outbound::Ping => panic!("expected message, got ping"),
        }
    }

    /// Drain everything currently queued without waiting.
    pub fn drain(rx: &mut Inbox) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    pub fn assert_no_message(rx: &mut Inbox) {
        let pending = drain(rx);
        assert!(pending.is_empty(), "expected no outbound items, got {pending:?}");
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
