//! Tally fan-out to live room subscribers.
//!
//! One `tokio::sync::broadcast` channel per room, created lazily on first
//! subscription. Delivery is best-effort and at-most-once: there is no
//! backlog for late subscribers (they pull a snapshot instead) and a lagging
//! receiver skips ahead.
//!
//! Each published tally carries the store version of its commit. A room's
//! channel only ever emits strictly increasing versions, so subscribers see
//! commits in order. An update that loses the race to a newer one is
//! dropped; the newer snapshot already contains it.

use roomvote_types::{RoomId, Tally};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

struct RoomChannel {
    tx: broadcast::Sender<Tally>,
    last_version: u64,
}

pub struct TallyBroadcaster {
    capacity: usize,
    channels: Mutex<HashMap<RoomId, RoomChannel>>,
}

impl TallyBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Start receiving tallies for `room_id`.
    ///
    /// Channels whose receivers have all been dropped are released here, so
    /// rooms that stop publishing (closed rooms, say) don't pin an entry.
    pub fn subscribe(&self, room_id: &RoomId) -> broadcast::Receiver<Tally> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let before = channels.len();
        channels.retain(|_, channel| channel.tx.receiver_count() > 0);
        if channels.len() < before {
            trace!(released = before - channels.len(), "released idle tally channels");
        }
        channels
            .entry(room_id.clone())
            .or_insert_with(|| RoomChannel {
                tx: broadcast::channel(self.capacity).0,
                last_version: 0,
            })
            .tx
            .subscribe()
    }

    /// Publish a committed tally. Returns the number of receivers reached.
    ///
    /// Never fails: no subscribers, a stale version or a dropped channel all
    /// just mean nothing is delivered.
    pub fn publish(&self, tally: Tally) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(channel) = channels.get_mut(&tally.room_id) else {
            return 0;
        };
        if tally.version <= channel.last_version {
            trace!(
                room_id = %tally.room_id,
                version = tally.version,
                last = channel.last_version,
                "dropping stale tally"
            );
            return 0;
        }
        channel.last_version = tally.version;

        let room_id = tally.room_id.clone();
        match channel.tx.send(tally) {
            Ok(n) => n,
            Err(_) => {
                debug!(room_id = %room_id, "no subscribers left, dropping channel");
                channels.remove(&room_id);
                0
            }
        }
    }

    /// Drop the room's channel. Every receiver sees `Closed` once drained.
    pub fn close(&self, room_id: &RoomId) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id);
    }

    /// Rooms currently holding a channel.
    pub fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

}

impl Default for TallyBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomvote_types::{OptionCount, OptionId, Timestamp};

    fn room() -> RoomId {
        RoomId::parse("room1").unwrap()
    }

    fn tally(version: u64, total: u64) -> Tally {
        Tally {
            room_id: room(),
            version,
            options: vec![OptionCount {
                option_id: OptionId::for_index(0),
                votes: total,
            }],
            total_votes: total,
            at: Timestamp::new(0),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_in_version_order() {
        let b = TallyBroadcaster::new(16);
        let mut rx1 = b.subscribe(&room());
        let mut rx2 = b.subscribe(&room());

        assert_eq!(b.publish(tally(2, 1)), 2);
        assert_eq!(b.publish(tally(3, 2)), 2);

        assert_eq!(rx1.recv().await.unwrap().version, 2);
        assert_eq!(rx1.recv().await.unwrap().version, 3);
        assert_eq!(rx2.recv().await.unwrap().total_votes, 1);
        assert_eq!(rx2.recv().await.unwrap().total_votes, 2);
    }

    #[tokio::test]
    async fn stale_versions_are_dropped() {
        let b = TallyBroadcaster::new(16);
        let mut rx = b.subscribe(&room());

        assert_eq!(b.publish(tally(5, 4)), 1);
        assert_eq!(b.publish(tally(4, 3)), 0);
        assert_eq!(b.publish(tally(6, 5)), 1);

        assert_eq!(rx.recv().await.unwrap().version, 5);
        assert_eq!(rx.recv().await.unwrap().version, 6);
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let b = TallyBroadcaster::new(16);
        assert_eq!(b.publish(tally(2, 1)), 0);
        assert_eq!(b.channel_count(), 0);
    }

    #[test]
    fn dropped_receivers_release_the_channel() {
        let b = TallyBroadcaster::new(16);
        let rx = b.subscribe(&room());
        assert_eq!(b.channel_count(), 1);
        drop(rx);
        assert_eq!(b.publish(tally(2, 1)), 0);
        assert_eq!(b.channel_count(), 0);
    }

    #[test]
    fn idle_channels_are_released_on_next_subscribe() {
        let b = TallyBroadcaster::new(16);
        let closed_room = RoomId::parse("closed").unwrap();
        drop(b.subscribe(&closed_room));
        assert_eq!(b.channel_count(), 1);

        let mut live = b.subscribe(&room());
        assert_eq!(b.channel_count(), 1);
        assert_eq!(b.publish(tally(2, 1)), 1);
        assert_eq!(live.try_recv().unwrap().version, 2);
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let b = TallyBroadcaster::new(16);
        let mut rx = b.subscribe(&room());
        b.close(&room());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
