//! Canonical voter identity used for one-vote-per-identity enforcement.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CallerId, PhoneNumber};

/// The identity a vote is recorded under.
///
/// Gated rooms always use [`VoterIdentity::Accredited`]; ungated rooms use
/// [`VoterIdentity::Authenticated`] when a caller id is known, otherwise a
/// [`VoterIdentity::Fingerprint`] (a best-effort heuristic, not a security
/// boundary).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VoterIdentity {
    Authenticated(CallerId),
    /// Lowercase hex digest over network origin and client signature.
    Fingerprint(String),
    Accredited(PhoneNumber),
}

impl fmt::Display for VoterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "user:{id}"),
            Self::Fingerprint(fp) => write!(f, "fp:{fp}"),
            Self::Accredited(phone) => write!(f, "phone:{}", phone.masked()),
        }
    }
}
