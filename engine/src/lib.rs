//! The room voting engine.
//!
//! Flow of a vote: request → identity resolution (or accreditation lookup for
//! gated rooms) → eligibility check and commit as one optimistic store update
//! → tally broadcast to live subscribers → receipt to the caller. The results
//! gate is consulted independently on every read of tallies.
//!
//! Key principle: one identity = one vote per room, and
//! `sum(option counters) == |voted identities|` after every commit.

pub mod accreditation;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod results;
pub mod rooms;
pub mod vote;

pub use accreditation::{AccreditedVoterView, LogOtpDelivery, OtpIssued, VoterEntry};
pub use broadcast::TallyBroadcaster;
pub use config::EngineConfig;
pub use engine::RoomEngine;
pub use error::{EngineError, ErrorKind};
pub use identity::{IdentityResolver, RequestContext};
pub use results::{ResultsGate, ResultsView, TallySubscription};
pub use rooms::{NewRoom, OptionView, RoomSummary, RoomView};
pub use vote::VoteReceipt;
