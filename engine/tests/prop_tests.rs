//! Property-based tests for the vote invariants.
//!
//! Any interleaving of vote attempts from a small pool of identities leaves
//! counters equal to the number of distinct accepted identities.

use proptest::prelude::*;
use roomvote_engine::{EngineConfig, EngineError, NewRoom, RequestContext, RoomEngine};
use roomvote_nullables::{NullClock, NullRandom, NullStore};
use roomvote_store::RoomStore;
use roomvote_types::{CallerId, OptionId, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;

proptest! {
    #[test]
    fn counters_match_distinct_voters(
        attempts in prop::collection::vec((0u8..10, 0usize..4), 1..60),
    ) {
        let store = Arc::new(NullStore::new());
        let engine = RoomEngine::new(store.clone(), EngineConfig::default())
            .with_clock(Arc::new(NullClock::new(1_000)))
            .with_tokens(Arc::new(NullRandom::new()));
        let id = engine
            .create_room(
                &CallerId::new("c").unwrap(),
                NewRoom {
                    title: "t".into(),
                    description: "d".into(),
                    options: vec!["a".into(), "b".into(), "c".into()],
                    deadline: Timestamp::new(2_000),
                    gated: false,
                    accredited_voters: Vec::new(),
                },
            )
            .unwrap()
            .room_id;

        let mut accepted = HashSet::new();
        for (who, option) in attempts {
            let ctx = RequestContext::anonymous(format!("10.0.0.{who}"), "ua");
            match engine.cast_vote(&id, &ctx, &OptionId::for_index(option), None) {
                Ok(_) => {
                    prop_assert!(option < 3);
                    prop_assert!(accepted.insert(who), "identity accepted twice");
                }
                Err(EngineError::InvalidOption(_)) => prop_assert_eq!(option, 3),
                Err(EngineError::AlreadyVoted) => prop_assert!(accepted.contains(&who)),
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        let room = store.get_room(&id).unwrap().unwrap().value;
        prop_assert!(room.tally_is_consistent());
        prop_assert_eq!(room.total_votes(), accepted.len() as u64);
    }
}
