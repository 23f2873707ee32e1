//! Abstract storage traits for the room voting engine.
//!
//! Every storage backend (in-memory, document database, ...) implements
//! [`RoomStore`]. The engine depends only on the trait.
//!
//! Mutations go through [`RoomStore::update_room`]. A backend that can hold
//! a room exclusively (the in-memory store locks the room's slot) runs the
//! mutation inside that section, so writers on one room never conflict.
//! Backends without such a section fall back to the provided optimistic
//! implementation: read a [`Versioned`] room, mutate a copy and write it back
//! with [`RoomStore::compare_and_swap`]. That write fails with
//! [`StoreError::VersionConflict`] if someone committed in between, and the
//! caller re-reads and retries.

pub mod error;

pub use error::StoreError;

use roomvote_types::{CallerId, Room, RoomId};
use serde::{Deserialize, Serialize};

/// A value together with the version it was stored at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Version assigned to a freshly inserted room.
pub const INITIAL_VERSION: u64 = 1;

/// Key-value room storage keyed by [`RoomId`].
pub trait RoomStore: Send + Sync {
    /// Read a room and its current version. `Ok(None)` if absent.
    fn get_room(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError>;

    /// Insert a new room at [`INITIAL_VERSION`]. Fails with
    /// [`StoreError::Duplicate`] if the id is taken.
    fn insert_room(&self, room: Room) -> Result<u64, StoreError>;

    /// Replace the room only if its stored version still equals `expected`.
    /// Returns the new version on success.
    fn compare_and_swap(&self, expected: u64, room: Room) -> Result<u64, StoreError>;

    /// Run `apply` against the current room and persist the result if it
    /// returns `true`. Returns the committed room and its new version, or
    /// `None` when `apply` declined and nothing was written.
    ///
    /// `apply` works on a copy: a declined mutation leaves no trace. Fails
    /// with [`StoreError::NotFound`] if the room is absent.
    fn update_room(
        &self,
        id: &RoomId,
        apply: &mut dyn FnMut(&mut Room) -> bool,
    ) -> Result<Option<Versioned<Room>>, StoreError> {
        let current = self
            .get_room(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut room = current.value;
        if !apply(&mut room) {
            return Ok(None);
        }
        let version = self.compare_and_swap(current.version, room.clone())?;
        Ok(Some(Versioned {
            version,
            value: room,
        }))
    }

    /// Remove a room. Returns whether it existed.
    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError>;

    /// All rooms owned by `creator`, in no particular order.
    fn rooms_by_creator(&self, creator: &CallerId) -> Result<Vec<Room>, StoreError>;

    /// Number of stored rooms.
    fn room_count(&self) -> Result<u64, StoreError>;
}
