//! Validation errors raised while constructing core types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("caller id must not be empty")]
    EmptyCallerId,
}

/// Why a one-time code could not be handed to the voter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpDeliveryError {
    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),
}
