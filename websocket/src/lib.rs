//! WebSocket server for live room tallies.
//!
//! Clients subscribe per room and receive:
//! - A snapshot of the current counts on subscribe
//! - A tally after every committed vote, in commit order
//! - A `closed` notice when the room is deleted
//!
//! Subscribing is subject to the same results gate as the HTTP API.

pub mod server;
pub mod subscriptions;

pub use server::{router, WebSocketServer, WsState};
pub use subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage};
