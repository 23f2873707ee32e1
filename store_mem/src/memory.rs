//! Room slots and the store that owns them.

use roomvote_store::{RoomStore, StoreError, Versioned, INITIAL_VERSION};
use roomvote_types::{CallerId, Room, RoomId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::trace;

/// One room's storage cell. `room` is `None` once the room is deleted, so a
/// writer that fetched the slot before deletion sees `NotFound` rather than
/// resurrecting it.
struct Slot {
    version: u64,
    room: Option<Room>,
}

/// Thread-safe in-memory room store.
///
/// The outer map lock is held only to look up or add/remove a slot; all
/// reads and writes of room contents go through the per-room mutex.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Slot>>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &RoomId) -> Option<Arc<Mutex<Slot>>> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn all_slots(&self) -> Vec<Arc<Mutex<Slot>>> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl RoomStore for MemoryRoomStore {
    fn get_room(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError> {
        let Some(slot) = self.slot(id) else {
            return Ok(None);
        };
        let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.room.as_ref().map(|room| Versioned {
            version: slot.version,
            value: room.clone(),
        }))
    }

    fn insert_room(&self, room: Room) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        if rooms.contains_key(&room.room_id) {
            return Err(StoreError::Duplicate(room.room_id.to_string()));
        }
        let id = room.room_id.clone();
        rooms.insert(
            id,
            Arc::new(Mutex::new(Slot {
                version: INITIAL_VERSION,
                room: Some(room),
            })),
        );
        Ok(INITIAL_VERSION)
    }

    fn compare_and_swap(&self, expected: u64, room: Room) -> Result<u64, StoreError> {
        let slot = self
            .slot(&room.room_id)
            .ok_or_else(|| StoreError::NotFound(room.room_id.to_string()))?;
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if slot.room.is_none() {
            return Err(StoreError::NotFound(room.room_id.to_string()));
        }
        if slot.version != expected {
            trace!(room_id = %room.room_id, expected, found = slot.version, "cas conflict");
            return Err(StoreError::VersionConflict {
                key: room.room_id.to_string(),
                expected,
                found: slot.version,
            });
        }

        slot.version += 1;
        slot.room = Some(room);
        Ok(slot.version)
    }

    /// Runs `apply` with the room's slot locked, so concurrent writers on one
    /// room queue up instead of conflicting.
    fn update_room(
        &self,
        id: &RoomId,
        apply: &mut dyn FnMut(&mut Room) -> bool,
    ) -> Result<Option<Versioned<Room>>, StoreError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut room) = slot.room.clone() else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        if !apply(&mut room) {
            return Ok(None);
        }

        slot.version += 1;
        slot.room = Some(room.clone());
        Ok(Some(Versioned {
            version: slot.version,
            value: room,
        }))
    }

    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError> {
        let removed = self
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(slot) => {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let existed = slot.room.take().is_some();
                slot.version += 1;
                Ok(existed)
            }
            None => Ok(false),
        }
    }

    fn rooms_by_creator(&self, creator: &CallerId) -> Result<Vec<Room>, StoreError> {
        Ok(self
            .all_slots()
            .iter()
            .filter_map(|slot| {
                let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                slot.room
                    .as_ref()
                    .filter(|room| &room.creator == creator)
                    .cloned()
            })
            .collect())
    }

    fn room_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64)
    }
}
