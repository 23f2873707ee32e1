//! Nullable random: deterministic room ids and codes.

use roomvote_crypto::{TokenSource, ROOM_ID_BYTES};
use roomvote_types::RoomId;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct Sequence {
    room_ids: Vec<String>,
    room_index: usize,
    codes: Vec<String>,
    code_index: usize,
    counter: u64,
}

/// A deterministic token source for testing.
///
/// Returns pre-configured values in order. Once a configured list runs out
/// (or if none was given) it falls back to a counter, so every call still
/// yields a fresh value.
#[derive(Default)]
pub struct NullRandom {
    seq: Mutex<Sequence>,
}

impl NullRandom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out these room ids first, in order. Repeats are allowed, which
    /// is how id collisions are simulated.
    pub fn with_room_ids(self, ids: Vec<&str>) -> Self {
        self.seq.lock().unwrap_or_else(PoisonError::into_inner).room_ids =
            ids.into_iter().map(String::from).collect();
        self
    }

    /// Hand out these codes first, in order.
    pub fn with_codes(self, codes: Vec<&str>) -> Self {
        self.seq.lock().unwrap_or_else(PoisonError::into_inner).codes =
            codes.into_iter().map(String::from).collect();
        self
    }
}

impl TokenSource for NullRandom {
    fn room_id(&self) -> RoomId {
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = match seq.room_ids.get(seq.room_index).cloned() {
            Some(id) => {
                seq.room_index += 1;
                id
            }
            None => {
                seq.counter += 1;
                format!("{:0width$x}", seq.counter, width = ROOM_ID_BYTES * 2)
            }
        };
        RoomId::parse(raw).unwrap_or_else(|e| panic!("null room id: {e}"))
    }

    fn otp_code(&self, digits: u32) -> String {
        let mut seq = self.seq.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(code) = seq.codes.get(seq.code_index).cloned() {
            seq.code_index += 1;
            return code;
        }
        seq.counter += 1;
        let bound = 10u64.pow(digits.clamp(1, 9));
        format!("{:0width$}", seq.counter % bound, width = digits as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_values_come_first() {
        let r = NullRandom::new()
            .with_room_ids(vec!["dup", "dup"])
            .with_codes(vec!["123456"]);
        assert_eq!(r.room_id().as_str(), "dup");
        assert_eq!(r.room_id().as_str(), "dup");
        assert_eq!(r.room_id().as_str().len(), ROOM_ID_BYTES * 2);
        assert_eq!(r.otp_code(6), "123456");
        assert_eq!(r.otp_code(6).len(), 6);
    }

    #[test]
    fn counter_values_are_distinct() {
        let r = NullRandom::new();
        assert_ne!(r.room_id(), r.room_id());
        assert_ne!(r.otp_code(6), r.otp_code(6));
    }
}
