//! Room lifecycle: create, read, list, delete.

use roomvote_store::StoreError;
use roomvote_types::{
    CallerId, OptionId, PhoneNumber, Room, RoomId, Timestamp, MAX_OPTIONS, MIN_OPTIONS,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::accreditation::{accredit, VoterEntry};
use crate::engine::{RoomEngine, STAT_ROOMS_CREATED, STAT_ROOMS_DELETED};
use crate::identity::RequestContext;
use crate::results::ResultsGate;
use crate::EngineError;

/// Attempts at finding an unused room id before giving up.
const ROOM_ID_ATTEMPTS: u32 = 3;

/// Creator input for a new room. Text fields are trimmed by the engine.
#[derive(Clone, Debug, Deserialize)]
pub struct NewRoom {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub deadline: Timestamp,
    #[serde(default)]
    pub gated: bool,
    #[serde(default)]
    pub accredited_voters: Vec<VoterEntry>,
}

/// Room as listed to its creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub options: Vec<OptionView>,
    pub deadline: Timestamp,
    pub is_expired: bool,
    pub total_votes: u64,
    pub gated: bool,
    pub max_voters: u32,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
    /// Absent when the viewer may not see tallies yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u64>,
}

/// Public view of a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub title: String,
    pub description: String,
    pub options: Vec<OptionView>,
    pub deadline: Timestamp,
    pub is_expired: bool,
    pub total_votes: u64,
    pub tallies_visible: bool,
    pub has_voted: bool,
    pub creator: CallerId,
    pub gated: bool,
    pub max_voters: u32,
    pub created_at: Timestamp,
}

fn option_views(room: &Room, visible: bool) -> Vec<OptionView> {
    room.options
        .iter()
        .map(|o| OptionView {
            id: o.id.clone(),
            text: o.text.clone(),
            votes: visible.then_some(o.vote_count),
        })
        .collect()
}

fn summary(room: &Room, now: Timestamp) -> RoomSummary {
    RoomSummary {
        room_id: room.room_id.clone(),
        title: room.title.clone(),
        description: room.description.clone(),
        options: option_views(room, true),
        deadline: room.deadline,
        is_expired: !room.is_open(now),
        total_votes: room.total_votes(),
        gated: room.gated,
        max_voters: room.max_voters,
        created_at: room.created_at,
    }
}

fn required_text(field: &str, raw: &str, max: usize) -> Result<String, EngineError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    if text.chars().count() > max {
        return Err(EngineError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(text.to_string())
}

impl RoomEngine {
    /// Validate input and store a new room owned by `creator`.
    pub fn create_room(
        &self,
        creator: &CallerId,
        new: NewRoom,
    ) -> Result<RoomSummary, EngineError> {
        let cfg = &self.config;
        let title = required_text("title", &new.title, cfg.max_title_len)?;
        let description = required_text("description", &new.description, cfg.max_description_len)?;

        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&new.options.len()) {
            return Err(EngineError::Validation(format!(
                "must have {MIN_OPTIONS}-{MAX_OPTIONS} options"
            )));
        }
        let options = new
            .options
            .iter()
            .map(|o| required_text("option", o, cfg.max_option_len))
            .collect::<Result<Vec<_>, _>>()?;

        let now = self.clock.now();
        if new.deadline <= now {
            return Err(EngineError::Validation("deadline must be in the future".into()));
        }

        for _ in 0..ROOM_ID_ATTEMPTS {
            let mut room = Room::new(
                self.tokens.room_id(),
                title.clone(),
                description.clone(),
                options.clone(),
                new.deadline,
                creator.clone(),
                now,
            );
            let added = accredit(&mut room, &new.accredited_voters, cfg.max_accredited_voters);
            room.gated = new.gated || added > 0;

            match self.store.insert_room(room.clone()) {
                Ok(_) => {
                    self.stats.increment(STAT_ROOMS_CREATED);
                    info!(
                        room_id = %room.room_id,
                        creator = %creator,
                        options = room.options.len(),
                        gated = room.gated,
                        deadline = %room.deadline,
                        "room created"
                    );
                    return Ok(summary(&room, now));
                }
                Err(StoreError::Duplicate(id)) => {
                    warn!(room_id = %id, "room id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::StoreContention {
            attempts: ROOM_ID_ATTEMPTS,
        })
    }

    /// Public view of a room for the requesting viewer.
    ///
    /// `phone` lets an accredited voter of a gated room learn whether they
    /// already voted.
    pub fn get_room(
        &self,
        room_id: &RoomId,
        ctx: &RequestContext,
        phone: Option<&str>,
    ) -> Result<RoomView, EngineError> {
        let room = self.load(room_id)?.value;
        let now = self.clock.now();
        let visible = ResultsGate::can_view_tallies(&room, ctx.caller.as_ref(), now);

        let has_voted = if room.gated {
            phone
                .and_then(|p| PhoneNumber::parse(p).ok())
                .and_then(|p| room.voter(&p).map(|v| v.has_voted))
                .unwrap_or(false)
        } else {
            room.has_voted(&self.resolver.resolve(ctx))
        };

        Ok(RoomView {
            room_id: room.room_id.clone(),
            title: room.title.clone(),
            description: room.description.clone(),
            options: option_views(&room, visible),
            deadline: room.deadline,
            is_expired: !room.is_open(now),
            total_votes: room.total_votes(),
            tallies_visible: visible,
            has_voted,
            creator: room.creator.clone(),
            gated: room.gated,
            max_voters: room.max_voters,
            created_at: room.created_at,
        })
    }

    /// Rooms owned by `creator`, newest first.
    pub fn list_rooms(&self, creator: &CallerId) -> Result<Vec<RoomSummary>, EngineError> {
        let now = self.clock.now();
        let mut rooms = self.store.rooms_by_creator(creator)?;
        rooms.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        Ok(rooms.iter().map(|r| summary(r, now)).collect())
    }

    /// Hard-delete a room. Creator only. Live subscriptions are closed.
    pub fn delete_room(&self, room_id: &RoomId, caller: &CallerId) -> Result<(), EngineError> {
        let room = self.load(room_id)?.value;
        if !room.is_creator(Some(caller)) {
            return Err(EngineError::Forbidden(
                "only the room creator can delete this room".into(),
            ));
        }
        if !self.store.delete_room(room_id)? {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        self.broadcaster.close(room_id);
        self.stats.increment(STAT_ROOMS_DELETED);
        info!(room_id = %room_id, "room deleted");
        Ok(())
    }
}
