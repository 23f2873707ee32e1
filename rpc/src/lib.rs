//! HTTP API for the room voting engine.
//!
//! Provides endpoints for:
//! - Room creation, lookup, listing and deletion
//! - Casting votes
//! - Results and live tally snapshots (behind the results gate)
//! - Accredited voter management and OTP challenges
//! - Health and operation counters
//!
//! Authentication is external: the caller id arrives in the `X-Caller-Id`
//! header and is trusted as-is.

pub mod context;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use context::{request_context, CALLER_HEADER};
pub use error::RpcError;
pub use server::{router, ApiState, RpcServer};
