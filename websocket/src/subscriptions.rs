//! Subscription bookkeeping and the wire messages of the tally feed.

use roomvote_types::{RoomId, Tally};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rooms a single connection may follow at once.
pub const MAX_ROOMS_PER_CLIENT: usize = 32;

/// A message from the client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { room_id: String },
    Unsubscribe { room_id: String },
    Ping,
}

/// A message to the client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        action: String,
        room_id: String,
    },
    /// Counts as of subscription time.
    Snapshot { tally: Tally },
    /// Counts after a committed vote.
    Tally { tally: Tally },
    /// The feed for this room has ended.
    Closed { room_id: String, reason: String },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }
}

/// Per-connection record of followed rooms.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    rooms: HashSet<RoomId>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start following `room_id`. Returns `false` if the per-client limit
    /// is reached.
    pub fn subscribe(&mut self, room_id: RoomId) -> bool {
        if !self.rooms.contains(&room_id) && self.rooms.len() >= MAX_ROOMS_PER_CLIENT {
            return false;
        }
        self.rooms.insert(room_id);
        true
    }

    /// Whether one more room may be followed.
    pub fn has_capacity_for(&self, room_id: &RoomId) -> bool {
        self.rooms.contains(room_id) || self.rooms.len() < MAX_ROOMS_PER_CLIENT
    }

    /// Returns whether the room was being followed.
    pub fn unsubscribe(&mut self, room_id: &RoomId) -> bool {
        self.rooms.remove(room_id)
    }
}

/// Drops anything at or below the last version delivered, so a tally
/// already folded into the subscribe snapshot is not sent twice.
#[derive(Clone, Copy, Debug)]
pub struct VersionFilter {
    last: u64,
}

impl VersionFilter {
    pub fn new(snapshot_version: u64) -> Self {
        Self {
            last: snapshot_version,
        }
    }

    pub fn admit(&mut self, version: u64) -> bool {
        if version > self.last {
            self.last = version;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(n: usize) -> RoomId {
        RoomId::parse(format!("room{n}")).unwrap()
    }

    #[test]
    fn client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","room_id":"abc"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                room_id: "abc".into()
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn error_without_code_omits_field() {
        let json = serde_json::to_string(&ServerMessage::error("nope")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"nope"}"#);
    }

    #[test]
    fn subscription_limit() {
        let mut subs = ClientSubscriptions::new();
        for n in 0..MAX_ROOMS_PER_CLIENT {
            assert!(subs.subscribe(room(n)));
        }
        assert!(!subs.has_capacity_for(&room(MAX_ROOMS_PER_CLIENT)));
        assert!(!subs.subscribe(room(MAX_ROOMS_PER_CLIENT)));
        // re-subscribing to a followed room is always allowed
        assert!(subs.subscribe(room(0)));
        assert!(subs.unsubscribe(&room(0)));
        assert!(!subs.unsubscribe(&room(0)));
        assert!(subs.has_capacity_for(&room(MAX_ROOMS_PER_CLIENT)));
    }

    #[test]
    fn version_filter_skips_snapshot_and_stale() {
        let mut f = VersionFilter::new(4);
        assert!(!f.admit(3));
        assert!(!f.admit(4));
        assert!(f.admit(5));
        assert!(!f.admit(5));
        assert!(f.admit(7));
    }
}
