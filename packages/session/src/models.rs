use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ClientId, SessionId};

/// A rendezvous point for up to two players sharing game state.
///
/// `players` is ordered by join time. `game_state` is whatever blob the most
/// recent successful join anchored — opaque to the relay apart from the
/// `state` presence marker.
#[derive(Debug, Clone)]
pub struct Room {
    /// Client ids of the current members, oldest first.
    pub players: Vec<ClientId>,
    /// Last game state anchored by a join.
    pub game_state: Value,
}

impl Room {
    /// A room never holds more than two players.
    pub const MAX_PLAYERS: usize = 2;
}

impl Default for Room {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            game_state: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Returns whether a game state blob carries the required `state` presence
/// marker. Everything else inside the blob is invisible to the relay.
#[must_use]
pub fn has_state_marker(game_state: &Value) -> bool {
    game_state.get("state").is_some()
}

/// Request to create or join a game session.
///
/// Without a `session_id` a fresh room is created; without a `game_state`
/// the room's stored state is inherited.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinGame {
    pub session_id: Option<SessionId>,
    pub game_state: Option<Value>,
}

/// Request to relay a game state update to a session's members.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameState {
    pub session_id: SessionId,
    pub game_state: Value,
}
