//! Accreditation: a creator-curated allow-list plus a single-use OTP
//! challenge gating who may vote in a room.
//!
//! Per-voter lifecycle: `Registered → OtpIssued → OtpVerified → Voted`.
//! A fresh code can be requested from any state but `Voted`; verifying
//! always consumes the code, so a verified-but-unused voter who asks again
//! must verify again.

use roomvote_crypto::constant_time_eq;
use roomvote_types::{
    AccreditedVoter, CallerId, OtpChallenge, OtpDelivery, OtpDeliveryError, PhoneNumber, Room,
    RoomId, Timestamp, VoterState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{RoomEngine, STAT_OTP_ISSUED, STAT_OTP_VERIFIED};
use crate::EngineError;

/// One row of an add-voters request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterEntry {
    pub name: String,
    pub phone: String,
}

/// What the creator sees for each accredited voter. Never includes the code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccreditedVoterView {
    pub name: String,
    pub phone: PhoneNumber,
    pub has_voted: bool,
    pub otp_verified: bool,
    pub state: VoterState,
}

/// Response to a code request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OtpIssued {
    pub expires_in_secs: u64,
    pub expires_at: Timestamp,
}

/// Default delivery: writes the challenge to the log for an external
/// sender to pick up.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOtpDelivery;

impl OtpDelivery for LogOtpDelivery {
    fn deliver(&self, challenge: &OtpChallenge) -> Result<(), OtpDeliveryError> {
        debug!(
            room_id = %challenge.room_id,
            phone = %challenge.phone.masked(),
            code = %challenge.code,
            expires_at = %challenge.expires_at,
            "otp ready for delivery"
        );
        Ok(())
    }
}

/// Append valid, non-duplicate entries to the room's list, up to `cap`
/// records in total. Malformed entries are skipped. Returns how many were
/// added.
pub(crate) fn accredit(room: &mut Room, entries: &[VoterEntry], cap: usize) -> usize {
    let mut added = 0;
    for entry in entries {
        if room.accredited_voters.len() >= cap {
            break;
        }
        let name = entry.name.trim();
        if name.is_empty() {
            continue;
        }
        let Ok(phone) = PhoneNumber::parse(&entry.phone) else {
            continue;
        };
        if room.voter(&phone).is_some() {
            continue;
        }
        room.accredited_voters.push(AccreditedVoter::new(name, phone));
        added += 1;
    }
    room.max_voters = room.accredited_voters.len() as u32;
    added
}

fn parse_phone(raw: &str) -> Result<PhoneNumber, EngineError> {
    PhoneNumber::parse(raw).map_err(|e| EngineError::Validation(e.to_string()))
}

fn require_creator(room: &Room, caller: &CallerId, action: &str) -> Result<(), EngineError> {
    if room.is_creator(Some(caller)) {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "only the room creator can {action}"
        )))
    }
}

/// Common preconditions for the OTP operations; returns the voter record.
fn open_challenge_target<'a>(
    room: &'a mut Room,
    phone: &PhoneNumber,
    now: Timestamp,
) -> Result<&'a mut AccreditedVoter, EngineError> {
    if !room.gated {
        return Err(EngineError::NotGated);
    }
    if !room.is_open(now) {
        return Err(EngineError::VotingClosed);
    }
    let voter = room
        .voter_mut(phone)
        .ok_or_else(|| EngineError::UnknownVoter(phone.masked()))?;
    if voter.has_voted {
        return Err(EngineError::AlreadyVoted);
    }
    Ok(voter)
}

impl RoomEngine {
    /// Add voters to the room's allow-list. Creator only. Marks the room as
    /// gated. Returns the number of records added.
    pub fn add_accredited_voters(
        &self,
        room_id: &RoomId,
        caller: &CallerId,
        entries: &[VoterEntry],
    ) -> Result<usize, EngineError> {
        let cap = self.config.max_accredited_voters;
        let committed = self.update_room(room_id, |room, _now| {
            require_creator(room, caller, "add accredited voters")?;
            let added = accredit(room, entries, cap);
            room.gated = true;
            Ok(added)
        })?;
        info!(
            room_id = %room_id,
            added = committed.value,
            skipped = entries.len() - committed.value,
            total = committed.room.max_voters,
            "accredited voters added"
        );
        Ok(committed.value)
    }

    /// Remove a voter who has not voted yet. Creator only.
    pub fn remove_accredited_voter(
        &self,
        room_id: &RoomId,
        caller: &CallerId,
        phone: &str,
    ) -> Result<(), EngineError> {
        let phone = parse_phone(phone)?;
        self.update_room(room_id, |room, _now| {
            require_creator(room, caller, "remove accredited voters")?;
            let index = room
                .accredited_voters
                .iter()
                .position(|v| v.phone == phone)
                .ok_or_else(|| EngineError::UnknownVoter(phone.masked()))?;
            if room.accredited_voters[index].has_voted {
                return Err(EngineError::AlreadyVoted);
            }
            room.accredited_voters.remove(index);
            room.max_voters = room.accredited_voters.len() as u32;
            Ok(())
        })?;
        info!(room_id = %room_id, phone = %phone.masked(), "accredited voter removed");
        Ok(())
    }

    /// The allow-list as the creator sees it.
    pub fn list_accredited_voters(
        &self,
        room_id: &RoomId,
        caller: &CallerId,
    ) -> Result<Vec<AccreditedVoterView>, EngineError> {
        let room = self.load(room_id)?.value;
        require_creator(&room, caller, "view accredited voters")?;
        Ok(room
            .accredited_voters
            .iter()
            .map(|v| AccreditedVoterView {
                name: v.name.clone(),
                phone: v.phone.clone(),
                has_voted: v.has_voted,
                otp_verified: v.otp_verified,
                state: v.state(),
            })
            .collect())
    }

    /// Issue a fresh code to an accredited voter. Any earlier code and any
    /// earlier verification are discarded.
    pub fn request_otp(&self, room_id: &RoomId, phone: &str) -> Result<OtpIssued, EngineError> {
        let phone = parse_phone(phone)?;
        let ttl = self.config.otp_ttl_secs;
        let digits = self.config.otp_digits;

        let committed = self.update_room(room_id, |room, now| {
            let voter = open_challenge_target(room, &phone, now)?;
            let code = self.tokens.otp_code(digits);
            let expires_at = now.plus_secs(ttl);
            voter.issue_otp(code.clone(), expires_at);
            Ok((code, expires_at))
        })?;
        let (code, expires_at) = committed.value;
        self.stats.increment(STAT_OTP_ISSUED);
        debug!(room_id = %room_id, phone = %phone.masked(), %expires_at, "otp issued");

        let challenge = OtpChallenge {
            room_id: room_id.clone(),
            phone,
            code,
            expires_at,
        };
        if let Err(e) = self.otp_delivery.deliver(&challenge) {
            warn!(room_id = %room_id, phone = %challenge.phone.masked(), error = %e, "otp delivery failed");
        }

        Ok(OtpIssued {
            expires_in_secs: expires_at.secs_until(committed.at),
            expires_at,
        })
    }

    /// Check a submitted code. On success the voter may cast one vote; the
    /// code itself is consumed either way the vote goes.
    pub fn verify_otp(&self, room_id: &RoomId, phone: &str, code: &str) -> Result<(), EngineError> {
        let phone = parse_phone(phone)?;
        let code = code.trim();

        self.update_room(room_id, |room, now| {
            let voter = open_challenge_target(room, &phone, now)?;
            let (Some(expected), Some(expires_at)) = (&voter.otp_code, voter.otp_expires_at) else {
                return Err(EngineError::InvalidCode);
            };
            if now > expires_at {
                return Err(EngineError::Expired);
            }
            if !constant_time_eq(expected.as_bytes(), code.as_bytes()) {
                return Err(EngineError::InvalidCode);
            }
            voter.mark_verified();
            Ok(())
        })?;
        self.stats.increment(STAT_OTP_VERIFIED);
        debug!(room_id = %room_id, phone = %phone.masked(), "otp verified");
        Ok(())
    }
}
