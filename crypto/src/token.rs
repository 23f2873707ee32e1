//! Room ids and one-time passcodes.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use roomvote_types::RoomId;

/// Random bytes behind a generated room id (hex-encoded to 32 chars).
pub const ROOM_ID_BYTES: usize = 16;

/// Source of unguessable tokens. Swapped for a deterministic one in tests.
pub trait TokenSource: Send + Sync {
    /// A fresh, URL-safe room id.
    fn room_id(&self) -> RoomId;

    /// A numeric code of exactly `digits` digits (leading zeros kept).
    fn otp_code(&self, digits: u32) -> String;
}

/// Tokens drawn from the operating system's random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn room_id(&self) -> RoomId {
        let mut bytes = [0u8; ROOM_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        RoomId::parse(hex::encode(bytes)).unwrap_or_else(|_| unreachable!("hex is url-safe"))
    }

    fn otp_code(&self, digits: u32) -> String {
        let digits = digits.clamp(1, 9);
        let bound = 10u32.pow(digits);
        let n = OsRng.gen_range(0..bound);
        format!("{:0width$}", n, width = digits as usize)
    }
}
