//! Axum-based HTTP server.

use axum::routing::{delete, get, post};
use axum::Router;
use roomvote_engine::RoomEngine;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;

/// Shared state handed to every handler.
pub struct ApiState {
    pub engine: Arc<RoomEngine>,
    pub started: Instant,
}

impl ApiState {
    pub fn new(engine: Arc<RoomEngine>) -> Self {
        Self {
            engine,
            started: Instant::now(),
        }
    }
}

/// All API routes with tracing and permissive CORS applied.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/rooms", post(handlers::create_room))
        .route("/rooms/mine", get(handlers::list_my_rooms))
        .route(
            "/rooms/:room_id",
            get(handlers::get_room).delete(handlers::delete_room),
        )
        .route("/rooms/:room_id/vote", post(handlers::cast_vote))
        .route("/rooms/:room_id/results", get(handlers::get_results))
        .route("/rooms/:room_id/tallies", get(handlers::live_tallies))
        .route("/rooms/:room_id/request-otp", post(handlers::request_otp))
        .route("/rooms/:room_id/verify-otp", post(handlers::verify_otp))
        .route(
            "/rooms/:room_id/accredited-voters",
            post(handlers::add_accredited_voters).get(handlers::list_accredited_voters),
        )
        .route(
            "/rooms/:room_id/accredited-voters/:phone",
            delete(handlers::remove_accredited_voter),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub addr: SocketAddr,
    pub state: Arc<ApiState>,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, engine: Arc<RoomEngine>) -> Self {
        Self {
            addr,
            state: Arc::new(ApiState::new(engine)),
        }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "HTTP API listening");
        axum::serve(
            listener,
            router(self.state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}
