use roomvote_store::StoreError;
use thiserror::Error;

/// Coarse error classes callers map to their own transport (HTTP status, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input. No state changed.
    Validation,
    /// Room or voter absent.
    NotFound,
    /// Caller lacks the required relationship to the room.
    Forbidden,
    /// Business-rule rejection. Never retried.
    Conflict,
    /// Storage failure or retry budget exhausted.
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("voter {0} is not on the accredited list")]
    UnknownVoter(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("voting has ended")]
    VotingClosed,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("you have already voted in this room")]
    AlreadyVoted,

    #[error("voter is not accredited for this room")]
    NotAccredited,

    #[error("one-time code has not been verified")]
    OtpNotVerified,

    #[error("invalid one-time code")]
    InvalidCode,

    #[error("one-time code has expired")]
    Expired,

    #[error("room does not require accreditation")]
    NotGated,

    #[error("room is busy, gave up after {attempts} attempts")]
    StoreContention { attempts: u32 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidOption(_) => ErrorKind::Validation,
            Self::RoomNotFound(_) | Self::UnknownVoter(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::VotingClosed
            | Self::AlreadyVoted
            | Self::NotAccredited
            | Self::OtpNotVerified
            | Self::InvalidCode
            | Self::Expired
            | Self::NotGated => ErrorKind::Conflict,
            Self::StoreContention { .. } | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::RoomNotFound(_) => "room_not_found",
            Self::UnknownVoter(_) => "unknown_voter",
            Self::Forbidden(_) => "forbidden",
            Self::VotingClosed => "voting_closed",
            Self::InvalidOption(_) => "invalid_option",
            Self::AlreadyVoted => "already_voted",
            Self::NotAccredited => "not_accredited",
            Self::OtpNotVerified => "otp_not_verified",
            Self::InvalidCode => "invalid_code",
            Self::Expired => "expired",
            Self::NotGated => "not_gated",
            Self::StoreContention { .. } => "store_contention",
            Self::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rejections_are_conflicts() {
        for e in [
            EngineError::VotingClosed,
            EngineError::AlreadyVoted,
            EngineError::NotAccredited,
            EngineError::OtpNotVerified,
            EngineError::InvalidCode,
            EngineError::Expired,
        ] {
            assert_eq!(e.kind(), ErrorKind::Conflict, "{e}");
        }
    }

    #[test]
    fn contention_is_internal() {
        let e = EngineError::StoreContention { attempts: 8 };
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(e.code(), "store_contention");
    }
}
