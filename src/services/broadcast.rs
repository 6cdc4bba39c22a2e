//! Broadcast engine: fan-out of server messages to session members.
//!
//! DESIGN
//! ======
//! Callers hold the session lock, so each fan-out observes one consistent
//! membership. Delivery enqueues onto each recipient's unbounded outbound
//! queue and never waits: no retries, no acknowledgements, and one failed
//! recipient never stops delivery to the rest.
//!
//! A slow recipient is never skipped. Its backlog grows until it catches up
//! or the liveness monitor evicts it.

use tracing::debug;

use crate::protocol::ServerMessage;
use crate::state::{Member, Outbound, Session};

/// Queue one message for one member. Returns whether it was enqueued.
pub fn deliver(player_id: &str, member: &Member, msg: &ServerMessage) -> bool {
    let Some(outbox) = member.outbox.upgrade() else {
        debug!(%player_id, kind = msg.kind(), "broadcast: recipient connection gone");
        return false;
    };
    if outbox.send(Outbound::Message(msg.clone())).is_err() {
        debug!(%player_id, kind = msg.kind(), "broadcast: outbound queue closed");
        return false;
    }
    true
}

/// Send to a single member of the session.
pub fn send_to(session: &Session, player_id: &str, msg: &ServerMessage) -> bool {
    session
        .member(player_id)
        .is_some_and(|member| deliver(player_id, member, msg))
}

/// Targeted fan-out: every member except the originating sender.
pub fn broadcast_except(session: &Session, exclude: &str, msg: &ServerMessage) -> usize {
    session
        .members()
        .filter(|(id, _)| id.as_str() != exclude)
        .filter(|(id, member)| deliver(id, member, msg))
        .count()
}

/// Fan-out to every member, sender included.
pub fn broadcast_all(session: &Session, msg: &ServerMessage) -> usize {
    session
        .members()
        .filter(|(id, member)| deliver(id, member, msg))
        .count()
}

/// Build the full-state snapshot for a session.
#[must_use]
pub fn game_state(session: &Session) -> ServerMessage {
    ServerMessage::GameState { game_started: session.started(), players: session.snapshot() }
}

/// Send the full-state snapshot to every member.
pub fn broadcast_game_state(session: &Session) -> usize {
    broadcast_all(session, &game_state(session))
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
