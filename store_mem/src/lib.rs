//! In-memory storage backend for the room voting engine.
//!
//! Implements [`roomvote_store::RoomStore`] with one lock per room, so writers
//! on different rooms never contend and writers on the same room are
//! serialised only for the instant of the version check and swap.

pub mod memory;

pub use memory::MemoryRoomStore;
