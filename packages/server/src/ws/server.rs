//! WebSocket server implementation for managing client connections.
//!
//! `WsServer` owns the connection map and the per-room delivery groups, and
//! processes commands from the connection handlers on a single queue — one
//! command at a time, so relay operations never interleave. It implements
//! [`WebsocketSender`] over those maps, which is how the protocol layer
//! reaches clients.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use async_trait::async_trait;
use gamelink_session::RoomRegistry;
use gamelink_ws::{
    WebsocketContext, WebsocketDisconnectError, WebsocketMessageError, WebsocketSendError,
    WebsocketSender,
};
use log::{debug, error, info, trace};
use rand::Rng as _;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::ws::{ConnId, Msg, RoomId};

/// A command received by the [`WsServer`].
#[derive(Debug)]
enum Command {
    Connect {
        conn_tx: mpsc::UnboundedSender<Msg>,
        res_tx: oneshot::Sender<ConnId>,
    },

    Disconnect {
        conn: ConnId,
    },

    Message {
        msg: Msg,
        conn: ConnId,
        res_tx: oneshot::Sender<()>,
    },
}

/// The relay's connection substrate.
///
/// Call and spawn [`run`](Self::run) to start processing commands.
#[derive(Debug)]
pub struct WsServer {
    /// Map of connection IDs to their message senders.
    connections: BTreeMap<ConnId, mpsc::UnboundedSender<Msg>>,

    /// Map of room id to the connections subscribed to that room's
    /// broadcasts. Guarded so the protocol layer can update membership
    /// through [`WebsocketSender`] while a command is being handled.
    rooms: RwLock<BTreeMap<RoomId, BTreeSet<ConnId>>>,

    /// The authoritative session registry, shared with the API surface.
    registry: Arc<tokio::sync::RwLock<RoomRegistry>>,

    /// Tracks total number of historical connections established.
    visitor_count: Arc<AtomicUsize>,

    /// Command receiver.
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

#[async_trait]
impl WebsocketSender for WsServer {
    async fn send(&self, connection_id: &str, data: &str) -> Result<(), WebsocketSendError> {
        let id = connection_id.parse::<ConnId>()?;
        trace!("Sending to {id}");
        self.send_message_to(id, data.to_string());
        Ok(())
    }

    async fn send_room(&self, room_id: &str, data: &str) -> Result<(), WebsocketSendError> {
        trace!("Sending to room {room_id}");
        self.send_room_message(room_id, data.to_string());
        Ok(())
    }

    async fn subscribe(
        &self,
        connection_id: &str,
        room_id: &str,
    ) -> Result<(), WebsocketSendError> {
        let id = connection_id.parse::<ConnId>()?;
        self.rooms
            .write()
            .unwrap()
            .entry(room_id.to_owned())
            .or_default()
            .insert(id);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        connection_id: &str,
        room_id: &str,
    ) -> Result<(), WebsocketSendError> {
        let id = connection_id.parse::<ConnId>()?;
        let mut rooms = self.rooms.write().unwrap();

        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(&id);

            if members.is_empty() {
                rooms.remove(room_id);
            }
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), WebsocketSendError> {
        trace!("ping: pong");
        Ok(())
    }
}

impl WsServer {
    pub fn new(registry: Arc<tokio::sync::RwLock<RoomRegistry>>) -> (Self, WsServerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        (
            Self {
                connections: BTreeMap::new(),
                rooms: RwLock::new(BTreeMap::new()),
                registry,
                visitor_count: Arc::new(AtomicUsize::new(0)),
                cmd_rx,
            },
            WsServerHandle { cmd_tx },
        )
    }

    /// Send message to every connection subscribed to a room.
    fn send_room_message(&self, room: &str, msg: impl Into<String>) {
        let msg = msg.into();

        if let Some(members) = self.rooms.read().unwrap().get(room) {
            for conn_id in members {
                if let Some(tx) = self.connections.get(conn_id) {
                    // errors if client disconnected abruptly and hasn't been timed-out yet
                    let _ = tx.send(msg.clone());
                }
            }
        }
    }

    /// Send message directly to the user.
    fn send_message_to(&self, id: ConnId, msg: impl Into<String>) {
        if let Some(tx) = self.connections.get(&id) {
            // errors if client disconnected abruptly and hasn't been timed-out yet
            let _ = tx.send(msg.into());
        }
    }

    async fn on_message(
        &self,
        id: ConnId,
        msg: impl Into<String> + Send,
    ) -> Result<(), WebsocketMessageError> {
        let context = WebsocketContext {
            connection_id: id.to_string(),
        };

        let payload = msg.into();
        let body = serde_json::from_str::<Value>(&payload)
            .map_err(|e| WebsocketMessageError::InvalidPayload(payload, e.to_string()))?;

        gamelink_ws::process_message(&self.registry, body, context, self).await?;

        Ok(())
    }

    /// Register new connection, assign it a unique ID, and acknowledge it.
    async fn connect(&mut self, tx: mpsc::UnboundedSender<Msg>) -> ConnId {
        // register connection with random connection ID
        let id = rand::rng().random::<ConnId>();

        info!("Client connected {id}");

        self.connections.insert(id, tx);

        let count = self.visitor_count.fetch_add(1, Ordering::SeqCst);
        debug!("Visitor count: {}", count + 1);

        let context = WebsocketContext {
            connection_id: id.to_string(),
        };

        if let Err(e) = gamelink_ws::connect(self, &context).await {
            error!("Failed to acknowledge connection {id}: {e:?}");
        }

        // send id back
        id
    }

    /// Unregister connection from the delivery groups and run the
    /// protocol-level disconnect.
    async fn disconnect(&mut self, conn_id: ConnId) -> Result<(), WebsocketDisconnectError> {
        info!("Client disconnected {conn_id}");

        let count = self.visitor_count.fetch_sub(1, Ordering::SeqCst);
        debug!("Visitor count: {}", count - 1);

        // Drop the connection from every delivery group first so the
        // departure notice reaches only the remaining members.
        if self.connections.remove(&conn_id).is_some() {
            let mut rooms = self.rooms.write().unwrap();

            for members in rooms.values_mut() {
                members.remove(&conn_id);
            }

            rooms.retain(|_, members| !members.is_empty());
        }

        let context = WebsocketContext {
            connection_id: conn_id.to_string(),
        };

        gamelink_ws::disconnect(&self.registry, self, &context).await?;

        Ok(())
    }

    async fn process_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { conn_tx, res_tx } => {
                let conn_id = self.connect(conn_tx).await;

                if res_tx.send(conn_id).is_err() {
                    error!("Failed to send connection ID back to the handler");
                }
            }

            Command::Disconnect { conn } => {
                if let Err(error) = self.disconnect(conn).await {
                    error!("Failed to disconnect connection {conn}: {error:?}");
                }
            }

            Command::Message { conn, msg, res_tx } => {
                if let Err(error) = self.on_message(conn, msg.clone()).await {
                    error!("Failed to process message from {conn}: {msg:?}: {error:?}");
                }

                let _ = res_tx.send(());
            }
        }
    }

    /// Process commands one at a time until every handle is gone — the
    /// single dispatch queue that keeps relay operations from interleaving.
    pub async fn run(mut self) -> io::Result<()> {
        while let Some(cmd) = self.cmd_rx.recv().await {
            self.process_command(cmd).await;
        }

        debug!("Stopped WsServer");

        Ok(())
    }
}

/// Handle and command sender for the ws server.
///
/// Reduces boilerplate of setting up response channels in WebSocket handlers.
#[derive(Debug, Clone)]
pub struct WsServerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl WsServerHandle {
    /// Register client message sender and obtain connection ID.
    pub async fn connect(&self, conn_tx: mpsc::UnboundedSender<Msg>) -> ConnId {
        let (res_tx, res_rx) = oneshot::channel();

        // unwrap: ws server should not have been dropped
        self.cmd_tx
            .send(Command::Connect { conn_tx, res_tx })
            .unwrap();

        // unwrap: ws server does not drop our response channel
        res_rx.await.unwrap()
    }

    /// Forward an inbound message to the relay for processing.
    pub async fn send_message(&self, conn: ConnId, msg: impl Into<String>) {
        let (res_tx, res_rx) = oneshot::channel();

        // unwrap: ws server should not have been dropped
        self.cmd_tx
            .send(Command::Message {
                msg: msg.into(),
                conn,
                res_tx,
            })
            .unwrap();

        // unwrap: ws server does not drop our response channel
        res_rx.await.unwrap();
    }

    /// Unregister the connection and run the protocol-level disconnect.
    pub fn disconnect(&self, conn: ConnId) {
        // unwrap: ws server should not have been dropped
        self.cmd_tx.send(Command::Disconnect { conn }).unwrap();
    }
}
