//! Protocol: JSON wire format spoken between the relay and game clients.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text frame carries one JSON object with a `type`
//! discriminant. Inbound frames decode into the closed `ClientMessage` enum;
//! outbound notices are built as `ServerMessage` values and serialized by the
//! connection loop.
//!
//! DESIGN
//! ======
//! - Decoding is all-or-nothing. A frame that fails to parse, lacks `type`,
//!   names an unknown kind, or misses a required field for its kind is a
//!   `ProtocolError` and the connection is closed with a policy-violation code.
//! - Positions and directions are opaque to the relay. They are stored and
//!   echoed, never checked for plausibility.
//! - Unknown extra fields on known kinds are ignored.

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Sequential session identifier, starting at 1.
pub type GameId = u64;

/// Process-unique player identity assigned at connection accept.
pub type PlayerId = String;

/// Packed `0xRRGGBB` color as sent to clients.
pub type Color = u32;

/// Player colors, assigned at join time as `PALETTE[index % 8]`.
#[allow(clippy::unreadable_literal)]
pub const PALETTE: [Color; 8] = [
    0xFF4444, // red
    0x44FF44, // green
    0x4444FF, // blue
    0xFFFF44, // yellow
    0xFF44FF, // magenta
    0x44FFFF, // cyan
    0xFF8844, // orange
    0x8844FF, // purple
];

/// Health every member starts with.
pub const INITIAL_HEALTH: i32 = 100;

/// Close reason sent alongside the policy-violation code.
pub const POLICY_VIOLATION_REASON: &str = "Protocol violation";

/// Palette lookup with wrap-around.
#[must_use]
pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Three-component float vector used for both positions and directions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Last-known player location.
pub type Position = Vec3;

/// Shot heading as reported by the shooter.
pub type Direction = Vec3;

// =============================================================================
// INBOUND
// =============================================================================

/// Session reference carried by `join`. Any JSON value passes validation;
/// only a non-negative integer can resolve to a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameRef(pub serde_json::Value);

/// Largest integer a JSON number can carry without losing precision in a
/// JavaScript client.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl GameRef {
    /// The session id this reference names. Integral floats such as `1.0`
    /// resolve like the integer they equal.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resolve(&self) -> Option<GameId> {
        if let Some(id) = self.0.as_u64() {
            return Some(id);
        }
        let id = self.0.as_f64()?;
        ((0.0..=MAX_SAFE_INTEGER).contains(&id) && id.fract() == 0.0).then_some(id as GameId)
    }
}

impl From<GameId> for GameRef {
    fn from(id: GameId) -> Self {
        Self(serde_json::Value::from(id))
    }
}

/// Client → server message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Host { position: Position },
    Join { game_id: GameRef, position: Position },
    StartGame,
    Update { position: Position },
    Shoot { position: Position, direction: Direction },
    Hit { target_id: PlayerId },
    Ping,
}

impl ClientMessage {
    /// Wire name of the message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Host { .. } => "host",
            Self::Join { .. } => "join",
            Self::StartGame => "startGame",
            Self::Update { .. } => "update",
            Self::Shoot { .. } => "shoot",
            Self::Hit { .. } => "hit",
            Self::Ping => "ping",
        }
    }

    /// Field checks serde cannot express.
    fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Hit { target_id } if target_id.is_empty() => Err(ProtocolError::EmptyTarget),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// One entry of a full-state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Position,
    pub color: Color,
    pub health: i32,
    pub is_alive: bool,
}

/// One entry of the roster handed to a joining player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: PlayerId,
    pub position: Position,
    pub color: Color,
    pub health: i32,
    pub is_alive: bool,
    pub is_host: bool,
}

/// Server → client message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    GameCreated {
        game_id: GameId,
        player_id: PlayerId,
        color: Color,
        is_host: bool,
    },
    GameJoined {
        game_id: GameId,
        player_id: PlayerId,
        color: Color,
        players: Vec<RosterEntry>,
    },
    GameStarted,
    GameState {
        game_started: bool,
        players: Vec<PlayerSnapshot>,
    },
    PlayerJoined {
        player_id: PlayerId,
        position: Position,
        color: Color,
        health: i32,
        is_alive: bool,
        is_host: bool,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerMoved {
        player_id: PlayerId,
        position: Position,
    },
    PlayerShot {
        player_id: PlayerId,
        position: Position,
        direction: Direction,
        color: Color,
    },
    PlayerEliminated {
        target_id: PlayerId,
        shooter_id: PlayerId,
    },
}

impl ServerMessage {
    /// Wire name of the message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "gameCreated",
            Self::GameJoined { .. } => "gameJoined",
            Self::GameStarted => "gameStarted",
            Self::GameState { .. } => "gameState",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::PlayerMoved { .. } => "playerMoved",
            Self::PlayerShot { .. } => "playerShot",
            Self::PlayerEliminated { .. } => "playerEliminated",
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Grepable error code for log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Inbound frame rejected by the validator. Always fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("hit requires a non-empty targetId")]
    EmptyTarget,
    #[error("binary frame is not valid utf-8")]
    NotUtf8,
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED_FRAME",
            Self::EmptyTarget => "E_EMPTY_TARGET",
            Self::NotUtf8 => "E_NOT_UTF8",
        }
    }
}

// =============================================================================
// DECODE
// =============================================================================

/// Decode and validate one inbound text frame.
///
/// # Errors
///
/// Returns a `ProtocolError` for any frame that is not a complete, well-formed
/// message of a known kind.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage = serde_json::from_str(text)?;
    msg.validate()?;
    Ok(msg)
}

/// Decode a binary frame as UTF-8 JSON text.
///
/// # Errors
///
/// Returns `ProtocolError::NotUtf8` for non-UTF-8 payloads, otherwise the same
/// errors as [`decode`].
pub fn decode_binary(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;
    decode(text)
}

/// Serialize an outbound message to its JSON text form.
///
/// # Errors
///
/// Returns the serializer error; in practice serialization of these types
/// cannot fail.
pub fn encode(msg: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
