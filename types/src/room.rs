//! Rooms: a single time-boxed poll with 2-5 options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    AccreditedVoter, CallerId, OptionCount, OptionId, PhoneNumber, RoomId, Timestamp,
    VoterIdentity,
};

/// Fewest options a room may have.
pub const MIN_OPTIONS: usize = 2;
/// Most options a room may have.
pub const MAX_OPTIONS: usize = 5;

/// One answer in a room, with its running counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOption {
    pub id: OptionId,
    pub text: String,
    pub vote_count: u64,
}

/// A poll instance.
///
/// Invariant: `sum(options[i].vote_count) == voted_identities.len()`. Every
/// committed vote increments exactly one counter and inserts exactly one
/// identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub options: Vec<RoomOption>,
    /// Open while `now < deadline`.
    pub deadline: Timestamp,
    pub creator: CallerId,
    pub gated: bool,
    pub accredited_voters: Vec<AccreditedVoter>,
    /// Size of the accredited list.
    pub max_voters: u32,
    pub voted_identities: BTreeSet<VoterIdentity>,
    pub created_at: Timestamp,
}

impl Room {
    /// Build a fresh room with zeroed counters. Inputs are expected to be
    /// validated by the caller.
    pub fn new(
        room_id: RoomId,
        title: String,
        description: String,
        option_texts: Vec<String>,
        deadline: Timestamp,
        creator: CallerId,
        created_at: Timestamp,
    ) -> Self {
        let options = option_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| RoomOption {
                id: OptionId::for_index(i),
                text,
                vote_count: 0,
            })
            .collect();
        Self {
            room_id,
            title,
            description,
            options,
            deadline,
            creator,
            gated: false,
            accredited_voters: Vec::new(),
            max_voters: 0,
            voted_identities: BTreeSet::new(),
            created_at,
        }
    }

    /// The single place deadline logic lives. Closing is derived, never stored.
    pub fn is_open(&self, now: Timestamp) -> bool {
        now < self.deadline
    }

    pub fn is_creator(&self, caller: Option<&CallerId>) -> bool {
        caller == Some(&self.creator)
    }

    pub fn option_index(&self, id: &OptionId) -> Option<usize> {
        self.options.iter().position(|o| &o.id == id)
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.vote_count).sum()
    }

    pub fn option_counts(&self) -> Vec<OptionCount> {
        self.options
            .iter()
            .map(|o| OptionCount {
                option_id: o.id.clone(),
                votes: o.vote_count,
            })
            .collect()
    }

    pub fn has_voted(&self, identity: &VoterIdentity) -> bool {
        self.voted_identities.contains(identity)
    }

    pub fn voter(&self, phone: &PhoneNumber) -> Option<&AccreditedVoter> {
        self.accredited_voters.iter().find(|v| &v.phone == phone)
    }

    pub fn voter_mut(&mut self, phone: &PhoneNumber) -> Option<&mut AccreditedVoter> {
        self.accredited_voters.iter_mut().find(|v| &v.phone == phone)
    }

    /// Check the counter/identity invariant.
    pub fn tally_is_consistent(&self) -> bool {
        self.total_votes() == self.voted_identities.len() as u64
    }
}
