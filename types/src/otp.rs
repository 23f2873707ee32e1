//! One-time passcode challenges and their delivery seam.

use serde::{Deserialize, Serialize};

use crate::{OtpDeliveryError, PhoneNumber, RoomId, Timestamp};

/// What the engine hands to the delivery channel after issuing a code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub room_id: RoomId,
    pub phone: PhoneNumber,
    pub code: String,
    pub expires_at: Timestamp,
}

/// Sends a code to the voter (SMS gateway, email bridge, ...).
///
/// Delivery happens after the challenge is committed; a failure is logged
/// and never rolls the challenge back.
pub trait OtpDelivery: Send + Sync {
    fn deliver(&self, challenge: &OtpChallenge) -> Result<(), OtpDeliveryError>;
}
