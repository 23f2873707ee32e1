//! Timing-safe comparison.

use subtle::ConstantTimeEq;

/// Compare two byte strings in time independent of where they differ.
///
/// Lengths are not secret: strings of different length compare unequal
/// immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_and_unequal() {
        assert!(constant_time_eq(b"123456", b"123456"));
        assert!(!constant_time_eq(b"123456", b"123457"));
        assert!(!constant_time_eq(b"12345", b"123456"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn differs_only_in_first_byte() {
        assert!(!constant_time_eq(b"023456", b"123456"));
    }
}
