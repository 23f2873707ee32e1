//! Accredited voter records for gated rooms.

use serde::{Deserialize, Serialize};

use crate::{PhoneNumber, Timestamp};

/// Lifecycle of an accredited voter.
///
/// `Registered → OtpIssued → OtpVerified → Voted`. `OtpIssued` can be re-entered
/// from `Registered` or `OtpVerified`, never from `Voted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterState {
    Registered,
    OtpIssued,
    OtpVerified,
    Voted,
}

/// One entry on a gated room's allow-list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccreditedVoter {
    pub name: String,
    /// Unique within the room.
    pub phone: PhoneNumber,
    /// Set exactly once, never cleared.
    pub has_voted: bool,
    /// Outstanding one-time code, if a challenge is open.
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<Timestamp>,
    /// True only between a successful verification and the vote commit.
    pub otp_verified: bool,
}

impl AccreditedVoter {
    pub fn new(name: impl Into<String>, phone: PhoneNumber) -> Self {
        Self {
            name: name.into(),
            phone,
            has_voted: false,
            otp_code: None,
            otp_expires_at: None,
            otp_verified: false,
        }
    }

    /// Derive the lifecycle state from the stored fields.
    pub fn state(&self) -> VoterState {
        if self.has_voted {
            VoterState::Voted
        } else if self.otp_verified {
            VoterState::OtpVerified
        } else if self.otp_code.is_some() {
            VoterState::OtpIssued
        } else {
            VoterState::Registered
        }
    }

    /// Open a new challenge. Any earlier code or verification is discarded.
    pub fn issue_otp(&mut self, code: String, expires_at: Timestamp) {
        self.otp_code = Some(code);
        self.otp_expires_at = Some(expires_at);
        self.otp_verified = false;
    }

    /// Close the outstanding challenge as verified.
    pub fn mark_verified(&mut self) {
        self.otp_code = None;
        self.otp_expires_at = None;
        self.otp_verified = true;
    }

    /// Terminal transition applied when the vote commits.
    pub fn mark_voted(&mut self) {
        self.has_voted = true;
        self.otp_verified = false;
        self.otp_code = None;
        self.otp_expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter() -> AccreditedVoter {
        AccreditedVoter::new("Ada", PhoneNumber::parse("+15550001").unwrap())
    }

    #[test]
    fn walks_the_lifecycle() {
        let mut v = voter();
        assert_eq!(v.state(), VoterState::Registered);

        v.issue_otp("123456".into(), Timestamp::new(600));
        assert_eq!(v.state(), VoterState::OtpIssued);

        v.mark_verified();
        assert_eq!(v.state(), VoterState::OtpVerified);
        assert!(v.otp_code.is_none());
        assert!(v.otp_expires_at.is_none());

        v.mark_voted();
        assert_eq!(v.state(), VoterState::Voted);
        assert!(!v.otp_verified);
    }

    #[test]
    fn reissue_clears_verification() {
        let mut v = voter();
        v.issue_otp("111111".into(), Timestamp::new(600));
        v.mark_verified();
        v.issue_otp("222222".into(), Timestamp::new(900));
        assert_eq!(v.state(), VoterState::OtpIssued);
        assert!(!v.otp_verified);
        assert_eq!(v.otp_code.as_deref(), Some("222222"));
    }
}
