//! Tallies: per-option counts plus total, as of a given commit.

use serde::{Deserialize, Serialize};

use crate::{OptionId, RoomId, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option_id: OptionId,
    pub votes: u64,
}

/// Snapshot of a room's counters. `version` is the store version the
/// snapshot was read from or committed at; it only ever grows per room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub room_id: RoomId,
    pub version: u64,
    pub options: Vec<OptionCount>,
    pub total_votes: u64,
    pub at: Timestamp,
}

/// An option with its share of the total, as shown on the results page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResult {
    pub option_id: OptionId,
    pub text: String,
    pub votes: u64,
    /// Whole percent, rounded half up. 0 when there are no votes.
    pub percentage: u32,
}

impl OptionResult {
    pub fn percentage_of(votes: u64, total: u64) -> u32 {
        if total == 0 {
            return 0;
        }
        let scaled = (votes as u128 * 200 + total as u128) / (total as u128 * 2);
        scaled as u32
    }
}
