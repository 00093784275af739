//! WebSocket server and connection handling.
//!
//! This module owns the connection substrate for the relay: it accepts
//! websocket sessions, assigns connection ids, maintains the per-room
//! delivery groups, and drives the `gamelink_ws` protocol handlers.

pub mod handler;
pub mod server;

/// Connection ID type for identifying WebSocket clients.
///
/// Each connected client is assigned a unique numeric identifier.
pub type ConnId = u64;

/// Room ID type for identifying delivery groups.
///
/// Delivery groups mirror game session membership: a client subscribed to a
/// room receives every broadcast addressed to that session.
pub type RoomId = String;

/// Message type for WebSocket communication.
///
/// All WebSocket messages are transmitted as JSON-encoded strings.
pub type Msg = String;
