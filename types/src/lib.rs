//! Fundamental types for the room voting engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, phone numbers, timestamps, rooms and their options, accredited voter
//! records, voter identities and tallies.

pub mod error;
pub mod ids;
pub mod identity;
pub mod otp;
pub mod phone;
pub mod room;
pub mod tally;
pub mod time;
pub mod voter;

pub use error::{OtpDeliveryError, TypesError};
pub use ids::{CallerId, OptionId, RoomId};
pub use identity::VoterIdentity;
pub use otp::{OtpChallenge, OtpDelivery};
pub use phone::PhoneNumber;
pub use room::{Room, RoomOption, MAX_OPTIONS, MIN_OPTIONS};
pub use tally::{OptionCount, OptionResult, Tally};
pub use time::{Clock, SystemClock, Timestamp};
pub use voter::{AccreditedVoter, VoterState};
