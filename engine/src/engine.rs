//! The engine façade: owns the collaborators and the optimistic update loop
//! every mutating operation goes through.

use roomvote_crypto::{OsTokenSource, TokenSource};
use roomvote_store::{RoomStore, StoreError, Versioned};
use roomvote_types::{Clock, OtpDelivery, Room, RoomId, SystemClock, Tally, Timestamp};
use roomvote_utils::StatsCounter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

use crate::accreditation::LogOtpDelivery;
use crate::broadcast::TallyBroadcaster;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::identity::IdentityResolver;

pub(crate) const STAT_ROOMS_CREATED: &str = "rooms_created";
pub(crate) const STAT_ROOMS_DELETED: &str = "rooms_deleted";
pub(crate) const STAT_VOTES_CAST: &str = "votes_cast";
pub(crate) const STAT_VOTES_REJECTED: &str = "votes_rejected";
pub(crate) const STAT_OTP_ISSUED: &str = "otp_issued";
pub(crate) const STAT_OTP_VERIFIED: &str = "otp_verified";
pub(crate) const STAT_CAS_RETRIES: &str = "cas_retries";
pub(crate) const STAT_BROADCASTS: &str = "broadcasts_delivered";

const STAT_NAMES: &[&str] = &[
    STAT_ROOMS_CREATED,
    STAT_ROOMS_DELETED,
    STAT_VOTES_CAST,
    STAT_VOTES_REJECTED,
    STAT_OTP_ISSUED,
    STAT_OTP_VERIFIED,
    STAT_CAS_RETRIES,
    STAT_BROADCASTS,
];

/// Result of a successful optimistic update.
pub(crate) struct Committed<T> {
    pub value: T,
    pub version: u64,
    pub room: Room,
    pub at: Timestamp,
}

impl<T> Committed<T> {
    pub fn tally(&self) -> Tally {
        tally_of(&self.room, self.version, self.at)
    }
}

pub(crate) fn tally_of(room: &Room, version: u64, at: Timestamp) -> Tally {
    Tally {
        room_id: room.room_id.clone(),
        version,
        options: room.option_counts(),
        total_votes: room.total_votes(),
        at,
    }
}

/// Pause before retrying a conflicted write: yield for the first couple of
/// attempts, then sleep for an exponentially growing interval (capped).
fn backoff(attempt: u32) {
    if attempt < 3 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(Duration::from_micros(50 << attempt.min(10)));
    }
}

/// The room voting engine. Cheap to share behind an `Arc`; every method
/// takes `&self` and is safe to call from many threads at once.
pub struct RoomEngine {
    pub(crate) store: Arc<dyn RoomStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) tokens: Arc<dyn TokenSource>,
    pub(crate) otp_delivery: Arc<dyn OtpDelivery>,
    pub(crate) broadcaster: Arc<TallyBroadcaster>,
    pub(crate) resolver: IdentityResolver,
    pub(crate) config: EngineConfig,
    pub(crate) stats: StatsCounter,
}

impl RoomEngine {
    /// Engine with wall-clock time, OS randomness and log-only OTP delivery.
    pub fn new(store: Arc<dyn RoomStore>, config: EngineConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(OsTokenSource),
            otp_delivery: Arc::new(LogOtpDelivery),
            broadcaster: Arc::new(TallyBroadcaster::new(config.broadcast_capacity)),
            resolver: IdentityResolver::new(config.fingerprint_includes_caller),
            config,
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_otp_delivery(mut self, delivery: Arc<dyn OtpDelivery>) -> Self {
        self.otp_delivery = delivery;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn broadcaster(&self) -> &Arc<TallyBroadcaster> {
        &self.broadcaster
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Read a room or fail with `RoomNotFound`.
    pub(crate) fn load(&self, id: &RoomId) -> Result<Versioned<Room>, EngineError> {
        self.store
            .get_room(id)?
            .ok_or_else(|| EngineError::RoomNotFound(id.to_string()))
    }

    /// Read-check-write step shared by every mutation.
    ///
    /// `apply` sees a private copy of the room and the current time, and
    /// either mutates it and returns `Ok`, or rejects with a business error,
    /// in which case nothing is written. The store runs `apply` and the write
    /// as one step per room, so the eligibility check and the commit can
    /// never be split by another writer. Stores without an exclusive section
    /// report a version conflict instead; the step is then retried against
    /// fresh state with a growing pause. Only version conflicts are retried.
    pub(crate) fn update_room<T>(
        &self,
        id: &RoomId,
        mut apply: impl FnMut(&mut Room, Timestamp) -> Result<T, EngineError>,
    ) -> Result<Committed<T>, EngineError> {
        let attempts = self.config.cas_max_attempts.max(1);
        for attempt in 1..=attempts {
            let mut outcome = None;
            let written = self.store.update_room(id, &mut |room| {
                let now = self.clock.now();
                let result = apply(room, now);
                let commit = result.is_ok();
                outcome = Some((result, now));
                commit
            });

            match (written, outcome) {
                (Ok(Some(stored)), Some((Ok(value), at))) => {
                    return Ok(Committed {
                        value,
                        version: stored.version,
                        room: stored.value,
                        at,
                    })
                }
                (Ok(_), Some((Err(e), _))) => return Err(e),
                (Ok(_), _) => {
                    return Err(StoreError::Backend(format!(
                        "update of room {id} finished without running the mutation"
                    ))
                    .into())
                }
                (Err(StoreError::VersionConflict { found, .. }), _) => {
                    self.stats.increment(STAT_CAS_RETRIES);
                    trace!(room_id = %id, attempt, found, "concurrent write, retrying");
                    backoff(attempt);
                }
                (Err(StoreError::NotFound(_)), _) => {
                    return Err(EngineError::RoomNotFound(id.to_string()));
                }
                (Err(e), _) => return Err(e.into()),
            }
        }
        warn!(room_id = %id, attempts, "giving up after repeated write conflicts");
        Err(EngineError::StoreContention { attempts })
    }

    /// Hand a committed tally to live subscribers. Never affects the commit.
    pub(crate) fn broadcast(&self, tally: Tally) {
        let delivered = self.broadcaster.publish(tally);
        if delivered > 0 {
            self.stats.add(STAT_BROADCASTS, delivered as u64);
        }
    }
}
