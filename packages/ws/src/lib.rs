//! WebSocket relay protocol for `GameLink`.
//!
//! This crate interprets the relay's message protocol — creating and
//! joining game sessions, relaying opaque state updates, and keeping
//! session membership consistent with connection lifecycle events. It is
//! transport-agnostic: the embedding connection service implements
//! [`WebsocketSender`] and forwards connects, disconnects, and inbound
//! messages to the handlers here.
//!
//! # Main Components
//!
//! * [`WebsocketSender`] - Trait the connection substrate implements for
//!   direct and per-room-group delivery
//! * [`WebsocketContext`] - Context information for a WebSocket connection
//! * [`process_message`] - Processes incoming WebSocket messages
//! * [`connect`] and [`disconnect`] - Handle connection lifecycle
//! * [`models`] - Message payload types for inbound and outbound communication

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod ws;

pub use ws::*;

pub mod models;
