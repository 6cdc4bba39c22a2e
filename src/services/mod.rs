//! Relay services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own registries, session logic, and fan-out so the route
//! handler can stay focused on transport framing and close codes.

pub mod broadcast;
pub mod connection;
pub mod game;
pub mod liveness;
pub mod session;
