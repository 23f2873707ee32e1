//! Live tally feed over a real socket.

use futures_util::{SinkExt, StreamExt};
use roomvote_engine::{EngineConfig, NewRoom, RequestContext, RoomEngine};
use roomvote_nullables::{NullClock, NullRandom, NullStore};
use roomvote_types::{CallerId, OptionId, RoomId, Timestamp};
use roomvote_websocket::{router, ServerMessage, WsState};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const T0: u64 = 1_700_000_000;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Fixture {
    engine: Arc<RoomEngine>,
    clock: Arc<NullClock>,
    addr: std::net::SocketAddr,
    room_id: RoomId,
}

async fn fixture() -> Fixture {
    let clock = Arc::new(NullClock::new(T0));
    let engine = Arc::new(
        RoomEngine::new(Arc::new(NullStore::new()), EngineConfig::default())
            .with_clock(clock.clone())
            .with_tokens(Arc::new(NullRandom::new())),
    );
    let room_id = engine
        .create_room(
            &CallerId::new("alice").unwrap(),
            NewRoom {
                title: "Live".into(),
                description: "watch the counts".into(),
                options: vec!["up".into(), "down".into()],
                deadline: Timestamp::new(T0 + 3_600),
                gated: false,
                accredited_voters: Vec::new(),
            },
        )
        .unwrap()
        .room_id;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(WsState {
        engine: engine.clone(),
    }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fixture {
        engine,
        clock,
        addr,
        room_id,
    }
}

async fn connect(f: &Fixture, caller: Option<&str>) -> Client {
    let url = match caller {
        Some(c) => format!("ws://{}/ws?caller={c}", f.addr),
        None => format!("ws://{}/ws", f.addr),
    };
    connect_async(url).await.unwrap().0
}

async fn send(client: &mut Client, json: serde_json::Value) {
    client.send(Message::Text(json.to_string())).await.unwrap();
}

async fn next(client: &mut Client) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for server message")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn subscribe(client: &mut Client, room_id: &RoomId) {
    send(
        client,
        serde_json::json!({ "type": "subscribe", "room_id": room_id.as_str() }),
    )
    .await;
}

fn vote(f: &Fixture, n: u32) {
    f.engine
        .cast_vote(
            &f.room_id,
            &RequestContext::anonymous(format!("10.0.0.{n}"), "ua"),
            &OptionId::for_index(0),
            None,
        )
        .unwrap();
}

#[tokio::test]
async fn creator_gets_snapshot_then_tallies() {
    let f = fixture().await;
    vote(&f, 1);

    let mut client = connect(&f, Some("alice")).await;
    subscribe(&mut client, &f.room_id).await;

    assert!(matches!(next(&mut client).await, ServerMessage::Ack { .. }));
    let ServerMessage::Snapshot { tally } = next(&mut client).await else {
        panic!("expected snapshot");
    };
    assert_eq!(tally.total_votes, 1);

    vote(&f, 2);
    vote(&f, 3);
    let ServerMessage::Tally { tally: first } = next(&mut client).await else {
        panic!("expected tally");
    };
    let ServerMessage::Tally { tally: second } = next(&mut client).await else {
        panic!("expected tally");
    };
    assert_eq!(first.total_votes, 2);
    assert_eq!(second.total_votes, 3);
    assert!(second.version > first.version);
}

#[tokio::test]
async fn non_creator_refused_while_open() {
    let f = fixture().await;
    let mut client = connect(&f, Some("bob")).await;
    subscribe(&mut client, &f.room_id).await;

    let ServerMessage::Error { code, .. } = next(&mut client).await else {
        panic!("expected error");
    };
    assert_eq!(code.as_deref(), Some("forbidden"));

    f.clock.advance(3_600);
    let mut anon = connect(&f, None).await;
    subscribe(&mut anon, &f.room_id).await;
    assert!(matches!(next(&mut anon).await, ServerMessage::Ack { .. }));
    assert!(matches!(next(&mut anon).await, ServerMessage::Snapshot { .. }));
}

#[tokio::test]
async fn delete_sends_closed() {
    let f = fixture().await;
    let mut client = connect(&f, Some("alice")).await;
    subscribe(&mut client, &f.room_id).await;
    next(&mut client).await;
    next(&mut client).await;

    f.engine
        .delete_room(&f.room_id, &CallerId::new("alice").unwrap())
        .unwrap();
    let ServerMessage::Closed { room_id, .. } = next(&mut client).await else {
        panic!("expected closed");
    };
    assert_eq!(room_id, f.room_id.as_str());

    // the deleted room no longer counts as followed
    send(
        &mut client,
        serde_json::json!({ "type": "unsubscribe", "room_id": f.room_id.as_str() }),
    )
    .await;
    let ServerMessage::Error { message, .. } = next(&mut client).await else {
        panic!("expected error");
    };
    assert!(message.starts_with("not subscribed"));
}

#[tokio::test]
async fn ping_unknown_room_and_garbage() {
    let f = fixture().await;
    let mut client = connect(&f, Some("alice")).await;

    send(&mut client, serde_json::json!({ "type": "ping" })).await;
    assert_eq!(next(&mut client).await, ServerMessage::Pong);

    subscribe(&mut client, &RoomId::parse("missing").unwrap()).await;
    let ServerMessage::Error { code, .. } = next(&mut client).await else {
        panic!("expected error");
    };
    assert_eq!(code.as_deref(), Some("room_not_found"));

    client.send(Message::Text("{not json".into())).await.unwrap();
    assert!(matches!(next(&mut client).await, ServerMessage::Error { code: None, .. }));

    send(
        &mut client,
        serde_json::json!({ "type": "unsubscribe", "room_id": f.room_id.as_str() }),
    )
    .await;
    assert!(matches!(next(&mut client).await, ServerMessage::Error { .. }));
}
