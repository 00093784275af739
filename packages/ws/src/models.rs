use gamelink_session::models::{JoinGame, UpdateGameState};
use gamelink_session::{ClientId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::AsRefStr;

/// Messages the relay accepts from a connected client.
#[derive(Debug, Serialize, Deserialize, Clone, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(tag = "type")]
pub enum InboundPayload {
    Ping(EmptyPayload),
    JoinGame(JoinGamePayload),
    UpdateGameState(UpdateGameStatePayload),
}

impl std::fmt::Display for InboundPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmptyPayload {}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinGamePayload {
    pub payload: JoinGame,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameStatePayload {
    pub payload: UpdateGameState,
}

/// Messages the relay emits to clients — either directly to the originating
/// connection (`Connected`, `GameError`) or to a session's delivery group.
#[derive(Debug, Serialize, Deserialize, Clone, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(tag = "type")]
pub enum OutboundPayload {
    Connected(ConnectedPayload),
    GameError(GameErrorPayload),
    InitUpdate(InitUpdatePayload),
    Update(UpdatePayload),
    PlayerLeft(PlayerLeftPayload),
}

impl std::fmt::Display for OutboundPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Connect acknowledgement carrying the id assigned to the connection.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub client_id: ClientId,
}

/// Rejection of a single operation. Never fatal to the connection.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GameErrorPayload {
    pub message: String,
}

/// Full session state broadcast after a successful join, to every member
/// including the joiner.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitUpdatePayload {
    pub session_id: SessionId,
    pub game_state: Value,
}

/// Relayed state update. Not persisted by the relay.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub game_state: Value,
}

/// Departure notice broadcast to a session's remaining members.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub player_id: ClientId,
}
