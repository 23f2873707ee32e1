//! Results visibility and tally reads.
//!
//! Per-option counts are hidden from everyone but the creator until the
//! deadline passes. Every read of counts, including live subscriptions, goes
//! through [`ResultsGate`].

use roomvote_types::{CallerId, OptionResult, Room, RoomId, Tally, Timestamp};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::engine::{tally_of, RoomEngine};
use crate::EngineError;

pub struct ResultsGate;

impl ResultsGate {
    /// Counts are visible once the room is closed, or to its creator at
    /// any time.
    pub fn can_view_tallies(room: &Room, viewer: Option<&CallerId>, now: Timestamp) -> bool {
        !room.is_open(now) || room.is_creator(viewer)
    }

    fn check(room: &Room, viewer: Option<&CallerId>, now: Timestamp) -> Result<(), EngineError> {
        if Self::can_view_tallies(room, viewer, now) {
            Ok(())
        } else {
            Err(EngineError::Forbidden(
                "results are available after the deadline".into(),
            ))
        }
    }
}

/// The results page for a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultsView {
    pub room_id: RoomId,
    pub title: String,
    pub options: Vec<OptionResult>,
    pub total_votes: u64,
    pub is_expired: bool,
    pub deadline: Timestamp,
}

/// A live feed of tallies for one room.
///
/// `snapshot` was read after the receiver was attached, so anything the
/// receiver yields with `version <= snapshot.version` is already reflected
/// in the snapshot and can be skipped.
pub struct TallySubscription {
    pub snapshot: Tally,
    pub receiver: broadcast::Receiver<Tally>,
}

impl RoomEngine {
    /// Per-option counts with percentages. Forbidden while the room is open
    /// unless `viewer` is the creator.
    pub fn get_results(
        &self,
        room_id: &RoomId,
        viewer: Option<&CallerId>,
    ) -> Result<ResultsView, EngineError> {
        let room = self.load(room_id)?.value;
        let now = self.clock.now();
        ResultsGate::check(&room, viewer, now)?;

        let total = room.total_votes();
        let options = room
            .options
            .iter()
            .map(|o| OptionResult {
                option_id: o.id.clone(),
                text: o.text.clone(),
                votes: o.vote_count,
                percentage: OptionResult::percentage_of(o.vote_count, total),
            })
            .collect();

        Ok(ResultsView {
            room_id: room.room_id.clone(),
            title: room.title.clone(),
            options,
            total_votes: total,
            is_expired: !room.is_open(now),
            deadline: room.deadline,
        })
    }

    /// Current counters, gated like [`get_results`](Self::get_results).
    pub fn live_tallies(
        &self,
        room_id: &RoomId,
        viewer: Option<&CallerId>,
    ) -> Result<Tally, EngineError> {
        let current = self.load(room_id)?;
        let now = self.clock.now();
        ResultsGate::check(&current.value, viewer, now)?;
        Ok(tally_of(&current.value, current.version, now))
    }

    /// Attach to the room's tally feed. The gate is checked once, here.
    pub fn subscribe(
        &self,
        room_id: &RoomId,
        viewer: Option<&CallerId>,
    ) -> Result<TallySubscription, EngineError> {
        let room = self.load(room_id)?.value;
        ResultsGate::check(&room, viewer, self.clock.now())?;

        let receiver = self.broadcaster.subscribe(room_id);
        let snapshot = match self.live_tallies(room_id, viewer) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if matches!(e, EngineError::RoomNotFound(_)) {
                    // deleted between the two reads
                    drop(receiver);
                    self.broadcaster.close(room_id);
                }
                return Err(e);
            }
        };
        trace!(room_id = %room_id, version = snapshot.version, "tally subscription opened");
        Ok(TallySubscription { snapshot, receiver })
    }
}
