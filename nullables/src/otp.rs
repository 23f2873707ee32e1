//! Nullable OTP delivery: record challenges instead of sending them.

use roomvote_types::{OtpChallenge, OtpDelivery, OtpDeliveryError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A test delivery channel that records every challenge.
#[derive(Default)]
pub struct NullOtpDelivery {
    sent: Mutex<Vec<OtpChallenge>>,
    failing: AtomicBool,
}

impl NullOtpDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries report failure (they are still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All challenges "sent" so far (for assertions).
    pub fn sent(&self) -> Vec<OtpChallenge> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent code sent to `phone`, matched on the normalized form.
    pub fn last_code(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|c| c.phone.as_str() == phone)
            .map(|c| c.code.clone())
    }
}

impl OtpDelivery for NullOtpDelivery {
    fn deliver(&self, challenge: &OtpChallenge) -> Result<(), OtpDeliveryError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(challenge.clone());
        if self.failing.load(Ordering::SeqCst) {
            Err(OtpDeliveryError::Unavailable(
                "null delivery configured to fail".into(),
            ))
        } else {
            Ok(())
        }
    }
}
