//! Blake2b hashing for voter fingerprints.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Deterministic fingerprint over network origin, client signature and an
/// optional caller id, as lowercase hex.
///
/// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn fingerprint_hex(origin: &str, signature: &str, caller: Option<&str>) -> String {
    let caller = caller.unwrap_or("");
    let origin_len = (origin.len() as u64).to_le_bytes();
    let signature_len = (signature.len() as u64).to_le_bytes();
    let caller_len = (caller.len() as u64).to_le_bytes();
    let digest = blake2b_256_multi(&[
        &origin_len,
        origin.as_bytes(),
        &signature_len,
        signature.as_bytes(),
        &caller_len,
        caller.as_bytes(),
    ]);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        assert_eq!(blake2b_256(b"hello room"), blake2b_256(b"hello room"));
        assert_ne!(blake2b_256(b"hello"), blake2b_256(b"world"));
    }

    #[test]
    fn multi_matches_concatenation() {
        assert_eq!(
            blake2b_256_multi(&[b"hello ", b"room"]),
            blake2b_256(b"hello room")
        );
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint_hex("10.0.0.1", "Mozilla/5.0", None);
        let b = fingerprint_hex("10.0.0.1", "Mozilla/5.0", None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_parts_do_not_shift() {
        assert_ne!(
            fingerprint_hex("ab", "c", None),
            fingerprint_hex("a", "bc", None)
        );
    }

    #[test]
    fn fingerprint_includes_caller() {
        assert_ne!(
            fingerprint_hex("ip", "ua", Some("u1")),
            fingerprint_hex("ip", "ua", None)
        );
    }
}
