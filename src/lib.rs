//! Multiplayer FPS relay: websocket sessions, membership, and fan-out.

pub mod config;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod state;
