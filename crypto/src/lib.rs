//! Cryptographic helpers for the room voting engine.
//!
//! - **Blake2b** digests for voter fingerprints
//! - Random room ids and one-time passcodes from the OS random source
//! - Constant-time comparison for submitted codes

pub mod compare;
pub mod hash;
pub mod token;

pub use compare::constant_time_eq;
pub use hash::{blake2b_256, blake2b_256_multi, fingerprint_hex};
pub use token::{OsTokenSource, TokenSource, ROOM_ID_BYTES};
