//! Casting a vote.

use roomvote_types::{OptionId, RoomId, VoterIdentity};
use serde::Serialize;
use tracing::debug;

use crate::engine::{RoomEngine, STAT_VOTES_CAST, STAT_VOTES_REJECTED};
use crate::identity::RequestContext;
use crate::EngineError;

/// Acknowledgement of a committed vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    /// Room total including this vote.
    pub total_votes: u64,
    /// Store version the vote was committed at.
    pub version: u64,
}

impl RoomEngine {
    /// Record one vote for `option_id`.
    ///
    /// The eligibility checks and the counter increment run inside one
    /// optimistic update, so two racing attempts by the same identity cannot
    /// both commit. `phone` is the voter's identity in gated rooms and is
    /// ignored otherwise.
    pub fn cast_vote(
        &self,
        room_id: &RoomId,
        ctx: &RequestContext,
        option_id: &OptionId,
        phone: Option<&str>,
    ) -> Result<VoteReceipt, EngineError> {
        let result = self.update_room(room_id, |room, now| {
            if !room.is_open(now) {
                return Err(EngineError::VotingClosed);
            }
            let index = room
                .option_index(option_id)
                .ok_or_else(|| EngineError::InvalidOption(option_id.to_string()))?;
            let identity = self.resolver.for_room(room, ctx, phone)?;
            if room.has_voted(&identity) {
                return Err(EngineError::AlreadyVoted);
            }

            if let VoterIdentity::Accredited(phone) = &identity {
                let voter = room.voter_mut(phone).ok_or(EngineError::NotAccredited)?;
                if voter.has_voted {
                    return Err(EngineError::AlreadyVoted);
                }
                if !voter.otp_verified {
                    return Err(EngineError::OtpNotVerified);
                }
                voter.mark_voted();
            }

            room.options[index].vote_count += 1;
            room.voted_identities.insert(identity.clone());
            Ok(identity)
        });

        match result {
            Ok(committed) => {
                let receipt = VoteReceipt {
                    total_votes: committed.room.total_votes(),
                    version: committed.version,
                };
                self.stats.increment(STAT_VOTES_CAST);
                debug!(
                    room_id = %room_id,
                    option = %option_id,
                    voter = %committed.value,
                    total = receipt.total_votes,
                    version = receipt.version,
                    "vote committed"
                );
                self.broadcast(committed.tally());
                Ok(receipt)
            }
            Err(e) => {
                self.stats.increment(STAT_VOTES_REJECTED);
                debug!(room_id = %room_id, option = %option_id, reason = e.code(), "vote rejected");
                Err(e)
            }
        }
    }
}
