//! Nullable store: in-memory storage with injectable write conflicts.

use roomvote_store::{RoomStore, StoreError, Versioned};
use roomvote_store_mem::MemoryRoomStore;
use roomvote_types::{CallerId, Room, RoomId};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

type ConflictHook = Box<dyn Fn() + Send + Sync>;

/// An in-memory room store for testing.
///
/// Behaves like [`MemoryRoomStore`], except that the next `n` writes can be
/// forced to report a version conflict, as if another writer had committed
/// first. A hook registered with [`NullStore::on_forced_conflict`] runs each
/// time, which lets a test move the world (the clock, say) between retries.
#[derive(Default)]
pub struct NullStore {
    inner: MemoryRoomStore,
    forced_conflicts: AtomicU32,
    write_attempts: AtomicU64,
    on_conflict: Mutex<Option<ConflictHook>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes with a version conflict.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Run `hook` every time a forced conflict is reported.
    pub fn on_forced_conflict(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_conflict.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Total writes seen (updates and compare-and-swaps), forced failures
    /// included.
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Count a write and decide whether it is forced to conflict.
    fn forced_conflict(&self, id: &RoomId, expected: u64) -> Option<StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()?;
        if let Some(hook) = self
            .on_conflict
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook();
        }
        Some(StoreError::VersionConflict {
            key: id.to_string(),
            expected,
            found: expected + 1,
        })
    }
}

impl RoomStore for NullStore {
    fn get_room(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError> {
        self.inner.get_room(id)
    }

    fn insert_room(&self, room: Room) -> Result<u64, StoreError> {
        self.inner.insert_room(room)
    }

    fn compare_and_swap(&self, expected: u64, room: Room) -> Result<u64, StoreError> {
        if let Some(conflict) = self.forced_conflict(&room.room_id, expected) {
            return Err(conflict);
        }
        self.inner.compare_and_swap(expected, room)
    }

    fn update_room(
        &self,
        id: &RoomId,
        apply: &mut dyn FnMut(&mut Room) -> bool,
    ) -> Result<Option<Versioned<Room>>, StoreError> {
        let version = self.inner.get_room(id)?.map(|v| v.version).unwrap_or(0);
        if let Some(conflict) = self.forced_conflict(id, version) {
            return Err(conflict);
        }
        self.inner.update_room(id, apply)
    }

    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError> {
        self.inner.delete_room(id)
    }

    fn rooms_by_creator(&self, creator: &CallerId) -> Result<Vec<Room>, StoreError> {
        self.inner.rooms_by_creator(creator)
    }

    fn room_count(&self) -> Result<u64, StoreError> {
        self.inner.room_count()
    }
}
