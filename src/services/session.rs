//! Session registry: creation, lookup, join, and member removal.
//!
//! DESIGN
//! ======
//! Sessions live in a `game_id -> Arc<Mutex<Session>>` map behind an async
//! `RwLock`. Each session's mutex is the single logical owner of its state:
//! every handler runs to completion against it, including the fan-out of
//! whatever it broadcasts, before releasing it. Sessions never coordinate
//! with each other.
//!
//! LOCK ORDER
//! ==========
//! Map lock first, then session lock. Joins hold the map read lock while they
//! touch the session; member removal holds the map write lock. That makes
//! "last member leaves" and "session disappears from the map" one step, so a
//! concurrent join can never land in a session that is about to be destroyed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::protocol::{Color, ErrorCode, GameId, PlayerId, Position, RosterEntry};
use crate::state::{Outbox, Session};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(GameId),
    #[error("session reference does not name a game id: {0}")]
    Unresolvable(String),
    #[error("already a member of session {0}")]
    AlreadyMember(GameId),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::Unresolvable(_) => "E_SESSION_NOT_FOUND",
            Self::AlreadyMember(_) => "E_ALREADY_MEMBER",
        }
    }
}

/// What a successful join hands back to the joining player.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub color: Color,
    /// Every other member at the moment of joining.
    pub players: Vec<RosterEntry>,
}

/// Outcome of removing a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure<R = ()> {
    /// The member was the last one; the session is gone.
    Destroyed,
    /// Members remain; carries whatever the caller computed on them.
    Remaining(R),
}

pub type SharedSession = Arc<Mutex<Session>>;

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: RwLock<HashMap<GameId, SharedSession>>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(RegistryInner { sessions: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }) }
    }

    /// Allocate the next id and create a session whose only member is the host.
    pub async fn create_session(&self, host_id: PlayerId, host_outbox: &Outbox, position: Position) -> GameId {
        self.create_session_with(host_id, host_outbox, position, |_| ())
            .await
            .0
    }

    /// Like [`Self::create_session`], running `f` on the new session before any
    /// other handler can see it.
    pub async fn create_session_with<R>(
        &self,
        host_id: PlayerId,
        host_outbox: &Outbox,
        position: Position,
        f: impl FnOnce(&mut Session) -> R,
    ) -> (GameId, R) {
        let mut sessions = self.inner.sessions.write().await;
        let game_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut session = Session::new(game_id, host_id, host_outbox, position);
        let result = f(&mut session);
        info!(game_id, host_id = %session.host_id, "session created");
        sessions.insert(game_id, Arc::new(Mutex::new(session)));

        (game_id, result)
    }

    /// Resolve a session handle by id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if no live session has this id.
    pub async fn lookup(&self, game_id: GameId) -> Result<SharedSession, SessionError> {
        self.inner
            .sessions
            .read()
            .await
            .get(&game_id)
            .cloned()
            .ok_or(SessionError::NotFound(game_id))
    }

    /// Run `f` against one session under its lock. `None` if it does not exist.
    pub async fn with_session<R>(&self, game_id: GameId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let sessions = self.inner.sessions.read().await;
        let shared = sessions.get(&game_id)?;
        let mut session = shared.lock().await;
        Some(f(&mut session))
    }

    /// Add a player to an existing session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist.
    pub async fn join(
        &self,
        game_id: GameId,
        joiner_id: PlayerId,
        outbox: &Outbox,
        position: Position,
    ) -> Result<Joined, SessionError> {
        self.join_with(game_id, joiner_id, outbox, position, |_, _| ())
            .await
            .map(|(joined, ())| joined)
    }

    /// Like [`Self::join`], running `f` on the session right after insertion,
    /// still under the session lock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist.
    pub async fn join_with<R>(
        &self,
        game_id: GameId,
        joiner_id: PlayerId,
        outbox: &Outbox,
        position: Position,
        f: impl FnOnce(&mut Session, &Joined) -> R,
    ) -> Result<(Joined, R), SessionError> {
        let sessions = self.inner.sessions.read().await;
        let shared = sessions
            .get(&game_id)
            .ok_or(SessionError::NotFound(game_id))?;
        let mut session = shared.lock().await;

        if session.contains(&joiner_id) {
            return Err(SessionError::AlreadyMember(game_id));
        }

        let color = session.add_member(joiner_id.clone(), outbox, position);
        let joined = Joined { color, players: session.roster_excluding(&joiner_id) };
        info!(
            game_id,
            player_id = %joiner_id,
            members = session.len(),
            next_color_index = session.next_color_index(),
            "player joined session"
        );

        let result = f(&mut session, &joined);
        Ok((joined, result))
    }

    /// Remove a member and its position, destroying the session if it empties.
    /// Returns `None` when the session or the member does not exist.
    pub async fn remove_member(&self, game_id: GameId, player_id: &str) -> Option<Departure> {
        self.remove_member_with(game_id, player_id, |_| ()).await
    }

    /// Like [`Self::remove_member`], running `f` on the surviving session under
    /// its lock when members remain.
    pub async fn remove_member_with<R>(
        &self,
        game_id: GameId,
        player_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<Departure<R>> {
        let mut sessions = self.inner.sessions.write().await;
        let shared = sessions.get(&game_id)?.clone();
        let mut session = shared.lock().await;

        if !session.remove_member(player_id) {
            return None;
        }
        info!(game_id, %player_id, remaining = session.len(), "player left session");

        if session.is_empty() {
            drop(session);
            sessions.remove(&game_id);
            info!(game_id, "session destroyed");
            return Some(Departure::Destroyed);
        }

        Some(Departure::Remaining(f(&mut session)))
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
