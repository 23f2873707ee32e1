//! Concurrent voting against one room: counters must match identities and
//! no identity may commit twice, however the threads interleave.

use roomvote_engine::{EngineConfig, EngineError, NewRoom, RequestContext, RoomEngine, VoterEntry};
use roomvote_nullables::{NullClock, NullOtpDelivery, NullRandom, NullStore};
use roomvote_store::RoomStore;
use roomvote_types::{CallerId, OptionId, RoomId, Timestamp};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const T0: u64 = 1_700_000_000;

fn engine(store: Arc<NullStore>, otp: Arc<NullOtpDelivery>) -> RoomEngine {
    RoomEngine::new(store, EngineConfig::default())
        .with_clock(Arc::new(NullClock::new(T0)))
        .with_tokens(Arc::new(NullRandom::new()))
        .with_otp_delivery(otp)
}

fn open_room(engine: &RoomEngine, voters: Vec<VoterEntry>) -> RoomId {
    engine
        .create_room(
            &CallerId::new("creator").unwrap(),
            NewRoom {
                title: "Concurrency".into(),
                description: "many voters at once".into(),
                options: vec!["a".into(), "b".into(), "c".into()],
                deadline: Timestamp::new(T0 + 3_600),
                gated: false,
                accredited_voters: voters,
            },
        )
        .unwrap()
        .room_id
}

#[test]
fn distinct_voters_all_counted() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 250;

    let store = Arc::new(NullStore::new());
    let engine = engine(store.clone(), Arc::new(NullOtpDelivery::new()));
    let id = open_room(&engine, Vec::new());

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let engine = &engine;
            let id = &id;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let ctx = RequestContext::anonymous(format!("10.{t}.{}.{}", i / 256, i % 256), "ua");
                    let option = OptionId::for_index((t + i) % 3);
                    if let Err(e) = engine.cast_vote(id, &ctx, &option, None) {
                        panic!("voter {t}/{i} rejected: {e}");
                    }
                }
            });
        }
    });

    let room = store.get_room(&id).unwrap().unwrap().value;
    assert_eq!(room.total_votes(), (THREADS * PER_THREAD) as u64);
    assert_eq!(room.voted_identities.len(), THREADS * PER_THREAD);
    assert!(room.tally_is_consistent());
    assert_eq!(engine.stats().get("cas_retries"), 0);
}

#[test]
fn same_identity_racing_commits_once() {
    const THREADS: usize = 16;

    let store = Arc::new(NullStore::new());
    let engine = engine(store.clone(), Arc::new(NullOtpDelivery::new()));
    let id = open_room(&engine, Vec::new());
    let ok = AtomicUsize::new(0);
    let dup = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let (engine, id, ok, dup) = (&engine, &id, &ok, &dup);
            s.spawn(move || {
                let ctx = RequestContext::anonymous("203.0.113.7", "same-browser");
                match engine.cast_vote(id, &ctx, &OptionId::for_index(t % 3), None) {
                    Ok(_) => ok.fetch_add(1, Ordering::SeqCst),
                    Err(EngineError::AlreadyVoted) => dup.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected error: {e}"),
                };
            });
        }
    });

    assert_eq!(ok.load(Ordering::SeqCst), 1);
    assert_eq!(dup.load(Ordering::SeqCst), THREADS - 1);
    let room = store.get_room(&id).unwrap().unwrap().value;
    assert_eq!(room.total_votes(), 1);
    assert!(room.tally_is_consistent());
}

#[test]
fn verified_voter_racing_from_many_devices_commits_once() {
    const THREADS: usize = 12;
    const PHONE: &str = "+15550001";

    let store = Arc::new(NullStore::new());
    let otp = Arc::new(NullOtpDelivery::new());
    let engine = engine(store.clone(), otp.clone());
    let id = open_room(
        &engine,
        vec![VoterEntry {
            name: "Ada".into(),
            phone: PHONE.into(),
        }],
    );
    engine.request_otp(&id, PHONE).unwrap();
    engine
        .verify_otp(&id, PHONE, &otp.last_code(PHONE).unwrap())
        .unwrap();

    let ok = AtomicUsize::new(0);
    std::thread::scope(|s| {
        for t in 0..THREADS {
            let (engine, id, ok) = (&engine, &id, &ok);
            s.spawn(move || {
                let ctx = RequestContext::anonymous(format!("10.0.0.{t}"), format!("device-{t}"));
                match engine.cast_vote(id, &ctx, &OptionId::for_index(0), Some(PHONE)) {
                    Ok(_) => {
                        ok.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(EngineError::AlreadyVoted) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            });
        }
    });

    assert_eq!(ok.load(Ordering::SeqCst), 1);
    let room = store.get_room(&id).unwrap().unwrap().value;
    assert_eq!(room.total_votes(), 1);
    assert!(room.accredited_voters[0].has_voted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broadcast_versions_strictly_increase_under_load() {
    const VOTERS: usize = 200;

    let store = Arc::new(NullStore::new());
    let engine = Arc::new(engine(store, Arc::new(NullOtpDelivery::new())));
    let id = open_room(&engine, Vec::new());
    let mut sub = engine
        .subscribe(&id, Some(&CallerId::new("creator").unwrap()))
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..VOTERS {
        let engine = engine.clone();
        let id = id.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let ctx = RequestContext::anonymous(format!("10.1.{}.{}", i / 256, i % 256), "ua");
            engine.cast_vote(&id, &ctx, &OptionId::for_index(i % 3), None)
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let mut last = sub.snapshot.version;
    let mut seen = 0;
    while let Ok(tally) = sub.receiver.try_recv() {
        assert!(tally.version > last, "out-of-order tally");
        assert_eq!(tally.options.iter().map(|o| o.votes).sum::<u64>(), tally.total_votes);
        last = tally.version;
        seen += 1;
    }
    assert!(seen >= 1);
    assert_eq!(engine.live_tallies(&id, Some(&CallerId::new("creator").unwrap())).unwrap().total_votes, VOTERS as u64);
}
