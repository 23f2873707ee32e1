//! Engine tunables, loadable from the `[engine]` table of the daemon config.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lifetime of an issued one-time code.
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: u64,

    /// Number of digits in a one-time code.
    #[serde(default = "default_otp_digits")]
    pub otp_digits: u32,

    /// Optimistic update attempts before giving up with `StoreContention`.
    #[serde(default = "default_cas_max_attempts")]
    pub cas_max_attempts: u32,

    /// Per-room broadcast buffer; slower subscribers skip ahead.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// When set, ungated rooms fold the caller id into the fingerprint
    /// instead of using it as the identity directly.
    #[serde(default)]
    pub fingerprint_includes_caller: bool,

    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,

    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,

    #[serde(default = "default_max_option_len")]
    pub max_option_len: usize,

    #[serde(default = "default_max_accredited_voters")]
    pub max_accredited_voters: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_otp_ttl_secs() -> u64 {
    600
}

fn default_otp_digits() -> u32 {
    6
}

fn default_cas_max_attempts() -> u32 {
    8
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_max_title_len() -> usize {
    200
}

fn default_max_description_len() -> usize {
    1000
}

fn default_max_option_len() -> usize {
    200
}

fn default_max_accredited_voters() -> usize {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            otp_ttl_secs: default_otp_ttl_secs(),
            otp_digits: default_otp_digits(),
            cas_max_attempts: default_cas_max_attempts(),
            broadcast_capacity: default_broadcast_capacity(),
            fingerprint_includes_caller: false,
            max_title_len: default_max_title_len(),
            max_description_len: default_max_description_len(),
            max_option_len: default_max_option_len(),
            max_accredited_voters: default_max_accredited_voters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let config: EngineConfig = toml::from_str("").expect("empty toml should use defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.otp_ttl_secs, 600);
        assert_eq!(config.otp_digits, 6);
    }

    #[test]
    fn partial_table_overrides() {
        let config: EngineConfig = toml::from_str(
            r#"
            otp_ttl_secs = 300
            cas_max_attempts = 3
            "#,
        )
        .expect("should parse");
        assert_eq!(config.otp_ttl_secs, 300);
        assert_eq!(config.cas_max_attempts, 3);
        assert_eq!(config.broadcast_capacity, 256);
    }
}
