//! HTTP request handlers.
//!
//! Each handler is a thin translation: extract ids and caller context, call
//! one engine operation, serialize the result. All business rules live in
//! the engine.

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use roomvote_engine::{
    AccreditedVoterView, EngineError, NewRoom, OtpIssued, ResultsView, RoomSummary, RoomView,
    VoteReceipt, VoterEntry,
};
use roomvote_types::{CallerId, OptionId, RoomId, Tally};
use roomvote_utils::format_duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::context::{caller, request_context};
use crate::error::RpcError;
use crate::pagination::{PaginationMeta, PaginationParams};
use crate::server::ApiState;

type ApiResult<T> = Result<Json<T>, RpcError>;

fn require_caller(headers: &HeaderMap) -> Result<CallerId, RpcError> {
    caller(headers).ok_or(RpcError::Unauthenticated)
}

fn room_id(raw: &str) -> Result<RoomId, RpcError> {
    RoomId::parse(raw).map_err(|_| EngineError::RoomNotFound(raw.to_string()).into())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

// ── Rooms ────────────────────────────────────────────────────────────────

pub async fn create_room(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    payload: Result<Json<NewRoom>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomSummary>), RpcError> {
    let creator = require_caller(&headers)?;
    let room = state.engine.create_room(&creator, body(payload)?)?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[derive(Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
    #[serde(flatten)]
    pub pagination: PaginationMeta,
}

pub async fn list_my_rooms(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(params): Query<PaginationParams>,
) -> ApiResult<RoomListResponse> {
    let creator = require_caller(&headers)?;
    let (rooms, pagination) = params.page(state.engine.list_rooms(&creator)?);
    Ok(Json(RoomListResponse { rooms, pagination }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

pub async fn get_room(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Query(query): Query<PhoneQuery>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> ApiResult<RoomView> {
    let ctx = request_context(&headers, connect.map(|c| c.0));
    let view = state
        .engine
        .get_room(&room_id(&id)?, &ctx, query.phone.as_deref())?;
    Ok(Json(view))
}

pub async fn delete_room(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, RpcError> {
    let creator = require_caller(&headers)?;
    state.engine.delete_room(&room_id(&id)?, &creator)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Voting ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: String,
    /// Required in gated rooms.
    pub phone: Option<String>,
}

pub async fn cast_vote(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<VoteReceipt> {
    let req = body(payload)?;
    let ctx = request_context(&headers, connect.map(|c| c.0));
    let receipt = state.engine.cast_vote(
        &room_id(&id)?,
        &ctx,
        &OptionId::new(req.option_id),
        req.phone.as_deref(),
    )?;
    Ok(Json(receipt))
}

// ── Results ──────────────────────────────────────────────────────────────

pub async fn get_results(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<ResultsView> {
    let viewer = caller(&headers);
    Ok(Json(state.engine.get_results(&room_id(&id)?, viewer.as_ref())?))
}

pub async fn live_tallies(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Tally> {
    let viewer = caller(&headers);
    Ok(Json(state.engine.live_tallies(&room_id(&id)?, viewer.as_ref())?))
}

// ── Accreditation ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifiedResponse {
    pub verified: bool,
}

pub async fn request_otp(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> ApiResult<OtpIssued> {
    let req = body(payload)?;
    Ok(Json(state.engine.request_otp(&room_id(&id)?, &req.phone)?))
}

pub async fn verify_otp(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> ApiResult<VerifiedResponse> {
    let req = body(payload)?;
    state
        .engine
        .verify_otp(&room_id(&id)?, &req.phone, &req.code)?;
    Ok(Json(VerifiedResponse { verified: true }))
}

#[derive(Debug, Deserialize)]
pub struct AddVotersRequest {
    pub voters: Vec<VoterEntry>,
}

#[derive(Serialize)]
pub struct AddVotersResponse {
    pub added: usize,
}

pub async fn add_accredited_voters(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<AddVotersRequest>, JsonRejection>,
) -> ApiResult<AddVotersResponse> {
    let creator = require_caller(&headers)?;
    let req = body(payload)?;
    let added = state
        .engine
        .add_accredited_voters(&room_id(&id)?, &creator, &req.voters)?;
    Ok(Json(AddVotersResponse { added }))
}

pub async fn list_accredited_voters(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<AccreditedVoterView>> {
    let creator = require_caller(&headers)?;
    Ok(Json(
        state
            .engine
            .list_accredited_voters(&room_id(&id)?, &creator)?,
    ))
}

pub async fn remove_accredited_voter(
    State(state): State<Arc<ApiState>>,
    Path((id, phone)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, RpcError> {
    let creator = require_caller(&headers)?;
    state
        .engine
        .remove_accredited_voter(&room_id(&id)?, &creator, &phone)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Health ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub uptime: String,
    /// Rooms with a live tally channel.
    pub tally_channels: usize,
    pub counters: HashMap<&'static str, u64>,
}

pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let uptime_secs = state.started.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok",
        uptime_secs,
        uptime: format_duration(uptime_secs),
        tally_channels: state.engine.broadcaster().channel_count(),
        counters: state.engine.stats().snapshot(),
    })
}
