//! In-memory registry of game sessions for the `GameLink` relay.
//!
//! The registry is the single authority over room membership: it owns the
//! map of live rooms and the reverse index from client id to current room,
//! and every mutation of either goes through its methods. It performs no
//! I/O and takes no locks — the embedding service is responsible for
//! serializing access (see `gamelink_ws`).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod models;

use std::collections::BTreeMap;

use rand::Rng as _;
use serde_json::Value;

use crate::models::{has_state_marker, Room};

/// Session id: a 6-digit decimal string in `100000..=999999`, short enough
/// to read out loud to the other player.
pub type SessionId = String;

/// Client id assigned by the connection layer, stable for the lifetime of
/// one connection.
pub type ClientId = String;

/// Bound on the id-generation retry loop. The id space holds ~900k values
/// and rooms carry at most two players, so hitting this means the registry
/// is in a pathological state and should fail loudly rather than spin.
const MAX_ID_ATTEMPTS: usize = 10_000;

/// Authoritative store of live rooms and of which room each client is in.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Map of session id to room state.
    active_games: BTreeMap<SessionId, Room>,

    /// Reverse index: client id to the session it currently belongs to.
    player_games: BTreeMap<ClientId, SessionId>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty room under a freshly generated session id and return
    /// the id. The new room has no players and no anchored state yet — the
    /// caller is expected to commit a join (or delete the room) before the
    /// operation that created it completes.
    ///
    /// # Panics
    ///
    /// * If no unused id can be found within [`MAX_ID_ATTEMPTS`]
    pub fn create_room(&mut self) -> SessionId {
        for _ in 0..MAX_ID_ATTEMPTS {
            let session_id = rand::rng().random_range(100_000..=999_999u32).to_string();

            if !self.active_games.contains_key(&session_id) {
                log::debug!("Created game {session_id}");
                self.active_games.insert(session_id.clone(), Room::default());
                return session_id;
            }
        }

        panic!("session id space exhausted after {MAX_ID_ATTEMPTS} attempts");
    }

    /// Append `client_id` to the room's members and replace the room's state
    /// with `game_state`. Returns `false` if the room does not exist.
    ///
    /// Capacity and state validation are protocol concerns checked by the
    /// caller before committing; this method applies the commit unchecked.
    /// The reverse index is also left to the caller (see
    /// [`set_current_room`](Self::set_current_room)) so the protocol layer
    /// can tie it to the success response.
    pub fn join(&mut self, session_id: &str, client_id: &str, game_state: Value) -> bool {
        let Some(room) = self.active_games.get_mut(session_id) else {
            return false;
        };

        room.players.push(client_id.to_owned());
        room.game_state = game_state;

        true
    }

    /// Remove `client_id` from whatever room the reverse index maps it to,
    /// deleting the room if it empties. Returns the session id the client
    /// left, when it actually left one.
    ///
    /// Idempotent: an unmapped client is a no-op. A reverse-index entry
    /// pointing at a room that no longer exists is cleared and reported as
    /// not having left anything.
    pub fn leave(&mut self, client_id: &str) -> Option<SessionId> {
        let session_id = self.player_games.remove(client_id)?;

        let Some(room) = self.active_games.get_mut(&session_id) else {
            log::warn!("Player {client_id} was mapped to missing game {session_id}");
            return None;
        };

        room.players.retain(|player| player != client_id);

        if room.players.is_empty() {
            self.active_games.remove(&session_id);
            log::debug!("Game {session_id} deleted");
        }

        Some(session_id)
    }

    /// Record that `client_id` is now a member of `session_id`. Called after
    /// a successful [`join`](Self::join) commit.
    pub fn set_current_room(&mut self, client_id: &str, session_id: &str) {
        self.player_games
            .insert(client_id.to_owned(), session_id.to_owned());
    }

    /// Remove a room outright, members or not. Used to roll back a room
    /// created earlier in an operation that subsequently failed validation.
    pub fn delete_room(&mut self, session_id: &str) {
        if self.active_games.remove(session_id).is_some() {
            log::debug!("Game {session_id} deleted");
        }
    }

    #[must_use]
    pub fn room_exists(&self, session_id: &str) -> bool {
        self.active_games.contains_key(session_id)
    }

    /// Number of members in the room, `0` if it does not exist.
    #[must_use]
    pub fn member_count(&self, session_id: &str) -> usize {
        self.active_games
            .get(session_id)
            .map_or(0, |room| room.players.len())
    }

    /// The room's anchored state, if the room exists and its state carries
    /// the `state` presence marker.
    #[must_use]
    pub fn current_state(&self, session_id: &str) -> Option<Value> {
        let room = self.active_games.get(session_id)?;

        if has_state_marker(&room.game_state) {
            Some(room.game_state.clone())
        } else {
            None
        }
    }

    /// The session `client_id` currently belongs to, if any.
    #[must_use]
    pub fn current_room_of(&self, client_id: &str) -> Option<&SessionId> {
        self.player_games.get(client_id)
    }

    /// Members of a room, oldest first. Empty if the room does not exist.
    #[must_use]
    pub fn members(&self, session_id: &str) -> Vec<ClientId> {
        self.active_games
            .get(session_id)
            .map(|room| room.players.clone())
            .unwrap_or_default()
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_games.len()
    }

    /// Number of clients currently in a room.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_games.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test_log::test]
    fn create_room_returns_six_digit_ids_in_range() {
        let mut registry = RoomRegistry::new();

        for _ in 0..50 {
            let id = registry.create_room();
            assert_eq!(id.len(), 6);
            let numeric = id.parse::<u32>().unwrap();
            assert!((100_000..=999_999).contains(&numeric), "id out of range: {id}");
        }
    }

    #[test_log::test]
    fn create_room_ids_are_unique_while_rooms_live() {
        let mut registry = RoomRegistry::new();

        let ids: Vec<SessionId> = (0..100).map(|_| registry.create_room()).collect();

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
        assert_eq!(registry.room_count(), ids.len());
    }

    #[test_log::test]
    fn join_missing_room_fails() {
        let mut registry = RoomRegistry::new();

        assert!(!registry.join("123456", "alice", json!({"state": "X"})));
        assert_eq!(registry.member_count("123456"), 0);
    }

    #[test_log::test]
    fn join_appends_players_in_order_and_replaces_state() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();

        assert!(registry.join(&id, "alice", json!({"state": "X"})));
        assert!(registry.join(&id, "bob", json!({"state": "Y"})));

        assert_eq!(registry.members(&id), vec!["alice".to_owned(), "bob".to_owned()]);
        assert_eq!(registry.current_state(&id), Some(json!({"state": "Y"})));
    }

    #[test_log::test]
    fn current_state_requires_presence_marker() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();

        // Freshly created rooms have no anchored state.
        assert_eq!(registry.current_state(&id), None);

        registry.join(&id, "alice", json!({"board": [0, 1, 2]}));
        assert_eq!(registry.current_state(&id), None);

        registry.join(&id, "bob", json!({"state": "X", "board": []}));
        assert_eq!(
            registry.current_state(&id),
            Some(json!({"state": "X", "board": []}))
        );
    }

    #[test_log::test]
    fn leave_removes_player_and_keeps_room_while_occupied() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();
        registry.join(&id, "alice", json!({"state": "X"}));
        registry.set_current_room("alice", &id);
        registry.join(&id, "bob", json!({"state": "X"}));
        registry.set_current_room("bob", &id);

        assert_eq!(registry.leave("alice"), Some(id.clone()));

        assert!(registry.room_exists(&id));
        assert_eq!(registry.members(&id), vec!["bob".to_owned()]);
        assert_eq!(registry.current_room_of("alice"), None);
    }

    #[test_log::test]
    fn leave_deletes_room_when_last_player_leaves() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();
        registry.join(&id, "alice", json!({"state": "X"}));
        registry.set_current_room("alice", &id);

        assert_eq!(registry.leave("alice"), Some(id.clone()));

        assert!(!registry.room_exists(&id));
        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.player_count(), 0);
    }

    #[test_log::test]
    fn leave_is_idempotent_for_unmapped_clients() {
        let mut registry = RoomRegistry::new();

        assert_eq!(registry.leave("nobody"), None);
        assert_eq!(registry.leave("nobody"), None);
    }

    #[test_log::test]
    fn leave_clears_dangling_reverse_index_entries() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();
        registry.join(&id, "alice", json!({"state": "X"}));
        registry.set_current_room("alice", &id);
        registry.delete_room(&id);

        // The entry pointed at a room that no longer exists — cleared, and
        // reported as not having left anything.
        assert_eq!(registry.leave("alice"), None);
        assert_eq!(registry.current_room_of("alice"), None);
    }

    #[test_log::test]
    fn reverse_index_matches_membership() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();
        registry.join(&id, "alice", json!({"state": "X"}));
        registry.set_current_room("alice", &id);

        let mapped = registry.current_room_of("alice").cloned().unwrap();
        assert_eq!(mapped, id);
        assert!(registry.members(&mapped).contains(&"alice".to_owned()));
    }

    #[test_log::test]
    fn member_count_never_observably_exceeds_capacity() {
        let mut registry = RoomRegistry::new();
        let id = registry.create_room();

        registry.join(&id, "alice", json!({"state": "X"}));
        registry.join(&id, "bob", json!({"state": "X"}));

        assert_eq!(registry.member_count(&id), Room::MAX_PLAYERS);
    }
}
