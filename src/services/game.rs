//! Session handlers: one per client message kind, plus disconnect cleanup.
//!
//! DESIGN
//! ======
//! Each handler resolves the sender's bound session, mutates it under its
//! lock, and performs its fan-out before releasing the lock. Handlers never
//! fail the connection: unknown sessions, unbound senders, and non-host
//! `startGame` requests are silently absorbed.
//!
//! Gameplay messages (`update`, `shoot`, `hit`) are accepted whether or not
//! the session has started. `hit` is trusted as reported: the target is not
//! checked and no health is deducted.
//!
//! LIFECYCLE
//! =========
//! 1. `host` / `join` → member created, connection bound
//! 2. gameplay messages → fan-out to the bound session
//! 3. close or eviction → `disconnect` → `playerLeft` + `gameState` to the
//!    survivors, or session destroyed when it was the last member

use tracing::{debug, info};

use crate::protocol::{
    ClientMessage, Direction, ErrorCode, GameId, GameRef, INITIAL_HEALTH, PlayerId, Position, ServerMessage,
};
use crate::services::broadcast;
use crate::services::session::{Departure, SessionError};
use crate::state::{AppState, Outbox};

/// Route a validated message to its handler.
pub async fn dispatch(state: &AppState, player_id: &PlayerId, outbox: &Outbox, msg: ClientMessage) {
    match msg {
        ClientMessage::Host { position } => {
            host(state, player_id, outbox, position).await;
        }
        ClientMessage::Join { game_id, position } => {
            if let Err(e) = join(state, player_id, outbox, &game_id, position).await {
                debug!(%player_id, code = e.error_code(), error = %e, "join dropped");
            }
        }
        ClientMessage::StartGame => {
            start_game(state, player_id).await;
        }
        ClientMessage::Update { position } => {
            update(state, player_id, position).await;
        }
        ClientMessage::Shoot { position, direction } => {
            shoot(state, player_id, position, direction).await;
        }
        ClientMessage::Hit { target_id } => {
            hit(state, player_id, target_id).await;
        }
        ClientMessage::Ping => {}
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Create a session with the sender as host and acknowledge with `gameCreated`.
pub async fn host(state: &AppState, player_id: &PlayerId, outbox: &Outbox, position: Position) -> GameId {
    let (game_id, ()) = state
        .sessions
        .create_session_with(player_id.clone(), outbox, position, |session| {
            let color = session.member(player_id).map_or(0, |member| member.color);
            let ack = ServerMessage::GameCreated {
                game_id: session.id,
                player_id: player_id.clone(),
                color,
                is_host: true,
            };
            broadcast::send_to(session, player_id, &ack);
        })
        .await;

    rebind(state, player_id, game_id).await;
    game_id
}

/// Add the sender to an existing session.
///
/// On success the joiner gets `gameJoined`, every earlier member gets
/// `playerJoined`, then everyone gets a `gameState` snapshot.
///
/// # Errors
///
/// Returns a `SessionError` when the reference does not resolve to a live
/// session, or names the session the sender is already in. No message is
/// sent in either case.
pub async fn join(
    state: &AppState,
    player_id: &PlayerId,
    outbox: &Outbox,
    game_ref: &GameRef,
    position: Position,
) -> Result<GameId, SessionError> {
    let Some(game_id) = game_ref.resolve() else {
        return Err(SessionError::Unresolvable(game_ref.0.to_string()));
    };
    if state.connections.bound_session(player_id).await == Some(game_id) {
        return Err(SessionError::AlreadyMember(game_id));
    }

    state
        .sessions
        .join_with(game_id, player_id.clone(), outbox, position, |session, joined| {
            let reply = ServerMessage::GameJoined {
                game_id,
                player_id: player_id.clone(),
                color: joined.color,
                players: joined.players.clone(),
            };
            broadcast::send_to(session, player_id, &reply);

            let notice = ServerMessage::PlayerJoined {
                player_id: player_id.clone(),
                position,
                color: joined.color,
                health: INITIAL_HEALTH,
                is_alive: true,
                is_host: false,
            };
            broadcast::broadcast_except(session, player_id, &notice);
            broadcast::broadcast_game_state(session);
        })
        .await?;

    rebind(state, player_id, game_id).await;
    Ok(game_id)
}

/// Bind the connection to `game_id` and leave whatever session it was in before.
async fn rebind(state: &AppState, player_id: &PlayerId, game_id: GameId) {
    if let Some(previous) = state.connections.bind(player_id, game_id).await {
        if previous != game_id {
            info!(%player_id, previous, game_id, "player switched sessions");
            leave(state, previous, player_id).await;
        }
    }
}

// =============================================================================
// GAMEPLAY
// =============================================================================

/// Start the sender's session. Only the host can; anyone else is a no-op.
pub async fn start_game(state: &AppState, player_id: &PlayerId) -> bool {
    let Some(game_id) = state.connections.bound_session(player_id).await else {
        return false;
    };

    let started = state
        .sessions
        .with_session(game_id, |session| {
            if !session.start(player_id) {
                return false;
            }
            broadcast::broadcast_all(session, &ServerMessage::GameStarted);
            true
        })
        .await
        .unwrap_or(false);

    if started {
        info!(game_id, %player_id, "game started");
    } else {
        debug!(game_id, %player_id, "startGame ignored");
    }
    started
}

/// Store the sender's position and relay it to everyone else.
pub async fn update(state: &AppState, player_id: &PlayerId, position: Position) -> bool {
    let Some(game_id) = state.connections.bound_session(player_id).await else {
        return false;
    };

    state
        .sessions
        .with_session(game_id, |session| {
            if !session.set_position(player_id, position) {
                return false;
            }
            let notice = ServerMessage::PlayerMoved { player_id: player_id.clone(), position };
            broadcast::broadcast_except(session, player_id, &notice);
            true
        })
        .await
        .unwrap_or(false)
}

/// Relay a shot, tagged with the shooter's color, to everyone else.
pub async fn shoot(state: &AppState, player_id: &PlayerId, position: Position, direction: Direction) -> bool {
    let Some(game_id) = state.connections.bound_session(player_id).await else {
        return false;
    };

    state
        .sessions
        .with_session(game_id, |session| {
            let Some(color) = session.member(player_id).map(|member| member.color) else {
                return false;
            };
            let notice = ServerMessage::PlayerShot { player_id: player_id.clone(), position, direction, color };
            broadcast::broadcast_except(session, player_id, &notice);
            true
        })
        .await
        .unwrap_or(false)
}

/// Announce an elimination to every member, shooter and target included.
pub async fn hit(state: &AppState, player_id: &PlayerId, target_id: PlayerId) -> bool {
    let Some(game_id) = state.connections.bound_session(player_id).await else {
        return false;
    };

    let delivered = state
        .sessions
        .with_session(game_id, |session| {
            let notice = ServerMessage::PlayerEliminated { target_id: target_id.clone(), shooter_id: player_id.clone() };
            broadcast::broadcast_all(session, &notice)
        })
        .await;

    if delivered.is_some() {
        info!(game_id, shooter_id = %player_id, %target_id, "player eliminated");
    }
    delivered.is_some()
}

// =============================================================================
// DISCONNECT
// =============================================================================

/// Cleanup for a closed or evicted connection.
pub async fn disconnect(state: &AppState, player_id: &PlayerId) {
    let Some(game_id) = state.connections.on_close(player_id).await else {
        return;
    };
    leave(state, game_id, player_id).await;
}

/// Remove a member; tell the survivors, or let the session go if none remain.
async fn leave(state: &AppState, game_id: GameId, player_id: &PlayerId) -> Option<Departure<usize>> {
    state
        .sessions
        .remove_member_with(game_id, player_id, |session| {
            let notice = ServerMessage::PlayerLeft { player_id: player_id.clone() };
            broadcast::broadcast_all(session, &notice);
            broadcast::broadcast_game_state(session)
        })
        .await
}

#[cfg(test)]
#[path = "game_test.rs"]
mod tests;
