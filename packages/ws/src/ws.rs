//! Relay protocol handling for the `GameLink` websocket API.
//!
//! This module interprets the inbound operations (join, update-state) and
//! the connection lifecycle events (connect, disconnect), consults and
//! mutates the [`RoomRegistry`], and decides what to send where. Transport
//! is abstracted behind [`WebsocketSender`], which the embedding connection
//! layer implements.
//!
//! Protocol rejections are not Rust errors: they are `GAME_ERROR` messages
//! delivered to the originating client only, after which the handler
//! returns `Ok`. The error enums below cover handler failures (malformed
//! payloads, delivery plumbing), which the connection layer logs without
//! tearing anything down.

use core::fmt;
use std::num::ParseIntError;

use async_trait::async_trait;
use gamelink_session::models::{has_state_marker, JoinGame, Room, UpdateGameState};
use gamelink_session::{RoomRegistry, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    ConnectedPayload, GameErrorPayload, InboundPayload, InitUpdatePayload, OutboundPayload,
    PlayerLeftPayload, UpdatePayload,
};

/// Response for websocket operations.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP-style status code indicating operation result.
    pub status_code: u16,
    /// Response message body.
    pub body: String,
}

/// Context for a websocket connection.
#[derive(Clone, Default, Debug)]
pub struct WebsocketContext {
    /// Unique identifier for this connection.
    pub connection_id: String,
}

/// Errors that can occur when sending websocket messages.
#[derive(Debug, Error)]
pub enum WebsocketSendError {
    /// Unknown error with details
    #[error("Unknown: {0}")]
    Unknown(String),
    /// Failed to parse a connection id
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    /// JSON serialization/deserialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Trait for sending messages via websocket.
///
/// Implemented by the connection substrate. `send` targets a single
/// connection; `send_room` delivers to every connection subscribed to a
/// session's delivery group. All sends are fire-and-forget: a slow or
/// already-gone recipient must not stall or fail the relay.
#[async_trait]
pub trait WebsocketSender: Send + Sync {
    /// Sends a message to a specific connection.
    ///
    /// # Errors
    ///
    /// * If the websocket message fails to send
    async fn send(&self, connection_id: &str, data: &str) -> Result<(), WebsocketSendError>;

    /// Sends a message to every connection in a session's delivery group.
    ///
    /// # Errors
    ///
    /// * If the websocket message fails to send
    async fn send_room(&self, room_id: &str, data: &str) -> Result<(), WebsocketSendError>;

    /// Adds a connection to a session's delivery group.
    ///
    /// # Errors
    ///
    /// * If the group membership fails to update
    async fn subscribe(&self, connection_id: &str, room_id: &str)
        -> Result<(), WebsocketSendError>;

    /// Removes a connection from a session's delivery group. The substrate
    /// additionally drops a connection from all groups when the connection
    /// itself goes away.
    ///
    /// # Errors
    ///
    /// * If the group membership fails to update
    async fn unsubscribe(
        &self,
        connection_id: &str,
        room_id: &str,
    ) -> Result<(), WebsocketSendError>;

    /// Sends a ping to all connections.
    ///
    /// # Errors
    ///
    /// * If the websocket ping fails to send
    async fn ping(&self) -> Result<(), WebsocketSendError>;
}

impl fmt::Debug for dyn WebsocketSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{WebsocketSender}}")
    }
}

/// Errors that can occur when handling a websocket connect event.
#[derive(Debug, Error)]
pub enum WebsocketConnectError {
    /// Websocket send error
    #[error(transparent)]
    WebsocketSend(#[from] WebsocketSendError),
    /// JSON serialization/deserialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Handles a websocket connection: acknowledges the client with its
/// assigned id. No registry mutation.
///
/// # Errors
///
/// * If the acknowledgement fails to serialize or send
pub async fn connect(
    sender: &impl WebsocketSender,
    context: &WebsocketContext,
) -> Result<Response, WebsocketConnectError> {
    let connected = OutboundPayload::Connected(ConnectedPayload {
        client_id: context.connection_id.clone(),
    });

    sender
        .send(
            &context.connection_id,
            &serde_json::to_value(connected)?.to_string(),
        )
        .await?;

    log::debug!("Connected {}", context.connection_id);

    Ok(Response {
        status_code: 200,
        body: "Connected".into(),
    })
}

/// Errors that can occur when disconnecting from a websocket.
#[derive(Debug, Error)]
pub enum WebsocketDisconnectError {
    /// Websocket send error
    #[error(transparent)]
    WebsocketSend(#[from] WebsocketSendError),
    /// JSON serialization/deserialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Handles a websocket disconnection: removes the client from its session,
/// notifies the remaining member, and lets the registry's delete-on-empty
/// rule fire. No-op for clients that were not in a session.
///
/// This runs even though the departing connection is already gone — the
/// departure notice targets the *other* member. The connection layer has
/// already dropped the departed connection from its delivery groups, so the
/// group broadcast cannot reach it.
///
/// # Errors
///
/// * If the departure notice fails to serialize or send
pub async fn disconnect(
    registry: &RwLock<RoomRegistry>,
    sender: &impl WebsocketSender,
    context: &WebsocketContext,
) -> Result<Response, WebsocketDisconnectError> {
    let mut registry = registry.write().await;

    if let Some(session_id) = registry.leave(&context.connection_id) {
        let player_left = OutboundPayload::PlayerLeft(PlayerLeftPayload {
            player_id: context.connection_id.clone(),
        });

        sender
            .send_room(&session_id, &serde_json::to_value(player_left)?.to_string())
            .await?;
    }

    log::debug!("Disconnected {}", context.connection_id);

    Ok(Response {
        status_code: 200,
        body: "Disconnected".into(),
    })
}

/// Errors that can occur when processing a websocket message.
#[derive(Debug, Error)]
pub enum WebsocketMessageError {
    /// Message type is not recognized or invalid
    #[error("Invalid message type")]
    InvalidMessageType,
    /// Message payload is invalid or malformed
    #[error("Invalid payload: '{0}' ({1})")]
    InvalidPayload(String, String),
    /// Websocket send error
    #[error(transparent)]
    WebsocketSend(#[from] WebsocketSendError),
    /// JSON serialization/deserialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Processes an incoming websocket message and routes it to the
/// appropriate handler.
///
/// # Errors
///
/// * If the message is an invalid type
/// * If the message fails to process
pub async fn process_message(
    registry: &RwLock<RoomRegistry>,
    body: Value,
    context: WebsocketContext,
    sender: &impl WebsocketSender,
) -> Result<Response, WebsocketMessageError> {
    let payload: InboundPayload = serde_json::from_value(body).map_err(|e| {
        log::error!("Invalid message type: {e:?}");
        WebsocketMessageError::InvalidMessageType
    })?;

    message(registry, sender, payload, &context).await
}

/// Routes a parsed websocket message to its appropriate handler.
///
/// # Errors
///
/// * If the message fails to process
pub async fn message(
    registry: &RwLock<RoomRegistry>,
    sender: &impl WebsocketSender,
    message: InboundPayload,
    context: &WebsocketContext,
) -> Result<Response, WebsocketMessageError> {
    let message_type = message.as_ref().to_string();
    log::debug!(
        "Received message type {} from {}: {:?}",
        message_type,
        context.connection_id,
        message
    );

    match message {
        InboundPayload::Ping(_) => {
            log::trace!("Ping");
        }
        InboundPayload::JoinGame(payload) => {
            join_game(registry, sender, context, &payload.payload).await?;
        }
        InboundPayload::UpdateGameState(payload) => {
            update_game_state(registry, sender, context, &payload.payload).await?;
        }
    }

    log::debug!(
        "Successfully processed message type {} from {}",
        message_type,
        context.connection_id
    );

    Ok(Response {
        status_code: 200,
        body: "Received".into(),
    })
}

/// Rejects the operation: sends a `GAME_ERROR` to the originating client
/// only. Rejections are part of the protocol, not handler failures.
async fn game_error(
    sender: &impl WebsocketSender,
    connection_id: &str,
    message: String,
) -> Result<(), WebsocketMessageError> {
    log::debug!("Rejecting {connection_id}: {message}");

    let error = OutboundPayload::GameError(GameErrorPayload { message });

    sender
        .send(connection_id, &serde_json::to_value(error)?.to_string())
        .await?;

    Ok(())
}

/// Creates or joins a game session.
///
/// The whole read-then-write sequence runs under the registry's write
/// guard, so create -> validate -> commit appears atomic to every other
/// relay operation.
async fn join_game(
    registry: &RwLock<RoomRegistry>,
    sender: &impl WebsocketSender,
    context: &WebsocketContext,
    request: &JoinGame,
) -> Result<(), WebsocketMessageError> {
    let client_id = &context.connection_id;
    let mut registry = registry.write().await;

    // A client plays in one session at a time — joining elsewhere silently
    // supersedes the previous membership (and deletes the old room if that
    // emptied it).
    if let Some(prior) = registry.current_room_of(client_id).cloned() {
        registry.leave(client_id);
        sender.unsubscribe(client_id, &prior).await?;
    }

    if let Some(session_id) = &request.session_id {
        if !registry.room_exists(session_id) {
            return game_error(sender, client_id, format!("No Game with ID {session_id}")).await;
        }

        if registry.member_count(session_id) >= Room::MAX_PLAYERS {
            return game_error(sender, client_id, format!("Game with ID {session_id} is full"))
                .await;
        }
    }

    if request.session_id.is_none() && request.game_state.is_none() {
        return game_error(sender, client_id, "No GameId or GameState".into()).await;
    }

    let (session_id, created) = match request.session_id.clone() {
        Some(session_id) => (session_id, false),
        None => (registry.create_room(), true),
    };

    // The supplied state wins; joining without one inherits whatever the
    // room last anchored.
    let game_state = request
        .game_state
        .clone()
        .or_else(|| registry.current_state(&session_id));

    let Some(game_state) = game_state.filter(has_state_marker) else {
        if created {
            registry.delete_room(&session_id);
        }
        return game_error(sender, client_id, format!("GameState Missing {session_id}")).await;
    };

    if !registry.join(&session_id, client_id, game_state.clone()) {
        // The room vanished between validation and commit.
        return game_error(sender, client_id, format!("No Game with ID {session_id}")).await;
    }

    registry.set_current_room(client_id, &session_id);
    sender.subscribe(client_id, &session_id).await?;

    let init_update = OutboundPayload::InitUpdate(InitUpdatePayload {
        session_id: session_id.clone(),
        game_state,
    });

    sender
        .send_room(&session_id, &serde_json::to_value(init_update)?.to_string())
        .await?;

    Ok(())
}

/// Relays a state update to a session's members.
///
/// The update is broadcast, never persisted — only join-time state becomes
/// the room's anchored state.
async fn update_game_state(
    registry: &RwLock<RoomRegistry>,
    sender: &impl WebsocketSender,
    context: &WebsocketContext,
    request: &UpdateGameState,
) -> Result<(), WebsocketMessageError> {
    let client_id = &context.connection_id;
    let session_id: &SessionId = &request.session_id;
    let registry = registry.read().await;

    if let Some(current) = registry.current_room_of(client_id) {
        if current != session_id {
            return game_error(sender, client_id, format!("Client not in game {session_id}"))
                .await;
        }
    }

    if !registry.room_exists(session_id) {
        return game_error(sender, client_id, format!("No Game with ID {session_id}")).await;
    }

    let update = OutboundPayload::Update(UpdatePayload {
        game_state: request.game_state.clone(),
    });

    sender
        .send_room(session_id, &serde_json::to_value(update)?.to_string())
        .await?;

    Ok(())
}
