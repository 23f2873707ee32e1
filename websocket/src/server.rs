//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws?caller=<id>` and lets clients follow
//! the live tallies of individual rooms. Each followed room gets a forwarder
//! task that drains the engine's broadcast receiver into the socket.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use roomvote_engine::{EngineError, RoomEngine};
use roomvote_types::{CallerId, RoomId, Tally};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage, VersionFilter};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared state for the WebSocket server.
pub struct WsState {
    pub engine: Arc<RoomEngine>,
}

/// The WebSocket server, configured with an address and the engine.
pub struct WebSocketServer {
    pub addr: SocketAddr,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(addr: SocketAddr, engine: Arc<RoomEngine>) -> Self {
        Self {
            addr,
            state: Arc::new(WsState { engine }),
        }
    }

    /// Listen for WebSocket connections until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "WebSocket server listening");
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}

pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct WsParams {
    caller: Option<String>,
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    let caller = params.caller.and_then(|c| CallerId::new(c).ok());
    ws.on_upgrade(move |socket| handle_socket(socket, state, caller))
}

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Split the socket into sender and receiver halves.
/// 2. Listen for client messages (subscribe, unsubscribe, ping).
/// 3. For each followed room, spawn a forwarder that relays tallies.
/// 4. Forget a room once its forwarder reports the feed closed.
/// 5. Abort every forwarder when the client disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>, caller: Option<CallerId>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    let mut conn = Connection {
        state,
        caller,
        subs: ClientSubscriptions::new(),
        forwarders: HashMap::new(),
        sender: ws_sender,
        closed_tx,
    };
    debug!(caller = ?conn.caller, "websocket client connected");

    loop {
        // closed feeds are handled first, so a client reacting to `closed`
        // already sees the room released
        let msg = tokio::select! {
            biased;
            Some(room_id) = closed_rx.recv() => {
                conn.forget(&room_id);
                continue;
            }
            msg = ws_receiver.next() => msg,
        };
        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
            None => break,
        };

        match msg {
            Message::Text(text) => conn.handle_text(&text).await,
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let _ = conn.sender.lock().await.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    for (room_id, handle) in conn.forwarders.drain() {
        debug!(room_id = %room_id, "aborting forwarder");
        handle.abort();
    }
    debug!("websocket client disconnected");
}

struct Connection {
    state: Arc<WsState>,
    caller: Option<CallerId>,
    subs: ClientSubscriptions,
    forwarders: HashMap<RoomId, JoinHandle<()>>,
    sender: WsSender,
    /// Forwarders report rooms whose feed closed (room deleted).
    closed_tx: mpsc::UnboundedSender<RoomId>,
}

impl Connection {
    async fn handle_text(&mut self, text: &str) {
        let client_msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                send(&self.sender, &ServerMessage::error(format!("invalid message: {e}"))).await;
                return;
            }
        };

        match client_msg {
            ClientMessage::Subscribe { room_id } => self.subscribe(room_id).await,
            ClientMessage::Unsubscribe { room_id } => self.unsubscribe(room_id).await,
            ClientMessage::Ping => {
                send(&self.sender, &ServerMessage::Pong).await;
            }
        }
    }

    async fn subscribe(&mut self, raw: String) {
        let Ok(room_id) = RoomId::parse(raw.as_str()) else {
            let err = EngineError::RoomNotFound(raw);
            send(&self.sender, &engine_error(&err)).await;
            return;
        };
        if !self.subs.has_capacity_for(&room_id) {
            send(&self.sender, &ServerMessage::error("too many subscriptions")).await;
            return;
        }

        // The gate only widens over time (open → closed), so one check at
        // subscribe time covers the life of the subscription.
        let sub = match self.state.engine.subscribe(&room_id, self.caller.as_ref()) {
            Ok(sub) => sub,
            Err(e) => {
                debug!(room_id = %room_id, reason = e.code(), "subscription refused");
                send(&self.sender, &engine_error(&e)).await;
                return;
            }
        };

        if let Some(old) = self.forwarders.remove(&room_id) {
            old.abort();
        }
        self.subs.subscribe(room_id.clone());

        send(
            &self.sender,
            &ServerMessage::Ack {
                action: "subscribe".into(),
                room_id: room_id.to_string(),
            },
        )
        .await;
        let snapshot_version = sub.snapshot.version;
        send(&self.sender, &ServerMessage::Snapshot { tally: sub.snapshot }).await;

        let handle = tokio::spawn(forward_tallies(
            sub.receiver,
            self.sender.clone(),
            self.closed_tx.clone(),
            room_id.clone(),
            snapshot_version,
        ));
        self.forwarders.insert(room_id.clone(), handle);
        debug!(room_id = %room_id, version = snapshot_version, "client subscribed");
    }

    async fn unsubscribe(&mut self, raw: String) {
        let room_id = RoomId::parse(raw.as_str()).ok();
        let was_subscribed = room_id
            .as_ref()
            .map(|id| self.subs.unsubscribe(id))
            .unwrap_or(false);
        if let Some(handle) = room_id.as_ref().and_then(|id| self.forwarders.remove(id)) {
            handle.abort();
        }

        let reply = if was_subscribed {
            ServerMessage::Ack {
                action: "unsubscribe".into(),
                room_id: raw,
            }
        } else {
            ServerMessage::error(format!("not subscribed to {raw}"))
        };
        send(&self.sender, &reply).await;
    }

    /// Drop a room whose feed has ended. Its forwarder has already exited.
    fn forget(&mut self, room_id: &RoomId) {
        self.forwarders.remove(room_id);
        if self.subs.unsubscribe(room_id) {
            debug!(room_id = %room_id, "released closed room");
        }
    }
}

fn engine_error(e: &EngineError) -> ServerMessage {
    ServerMessage::Error {
        message: e.to_string(),
        code: Some(e.code().to_string()),
    }
}

/// Serialize and send one message. Returns `false` if the client is gone.
async fn send(sender: &WsSender, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode server message");
            return true;
        }
    };
    sender.lock().await.send(Message::Text(text)).await.is_ok()
}

/// Forwarder task: relays a room's tallies to the client in version order.
async fn forward_tallies(
    mut rx: broadcast::Receiver<Tally>,
    sender: WsSender,
    closed: mpsc::UnboundedSender<RoomId>,
    room_id: RoomId,
    snapshot_version: u64,
) {
    let mut filter = VersionFilter::new(snapshot_version);
    loop {
        match rx.recv().await {
            Ok(tally) => {
                if !filter.admit(tally.version) {
                    continue;
                }
                if !send(&sender, &ServerMessage::Tally { tally }).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // the next tally received supersedes everything skipped
                warn!(room_id = %room_id, skipped = n, "subscriber lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(room_id = %room_id, "tally feed closed");
                let _ = closed.send(room_id.clone());
                send(
                    &sender,
                    &ServerMessage::Closed {
                        room_id: room_id.to_string(),
                        reason: "room deleted".into(),
                    },
                )
                .await;
                break;
            }
        }
    }
}
