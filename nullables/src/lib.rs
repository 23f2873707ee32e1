//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engine (clock, token randomness, storage,
//! OTP delivery) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod otp;
pub mod random;
pub mod store;

pub use clock::NullClock;
pub use otp::NullOtpDelivery;
pub use random::NullRandom;
pub use store::NullStore;
