// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the engagement core service.
//!
//! Every inbound request passes the admission middleware first, then the
//! handler resolves the bearer identity where the route requires one and
//! calls into the core. No engagement or auth rules live here.

use crate::config::Config;
use crate::engagement::{
    EngageableEntity, EngagementLedger, ReactionResult, ReactionSummary, VoteResult,
};
use crate::error::CoreError;
use crate::limiter::{Admission, AdmissionController, EndpointClass};
use crate::notify::{Notification, Notifier};
use crate::session::{bearer_token, AccessGuard, AuthState, Session};
use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub guard: AccessGuard,
    pub admission: AdmissionController,
    pub ledger: EngagementLedger,
    pub notifier: Notifier,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

#[derive(Debug, Deserialize)]
pub struct EntityRequest {
    #[serde(default)]
    pub poll: Option<PollRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PollRequest {
    pub options: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EntityCreated {
    pub entity_id: String,
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub reaction_type: String,
}

#[derive(Debug, Serialize)]
pub struct UnreactResponse {
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_index: usize,
}

#[derive(Debug, Serialize)]
pub struct TallyResponse {
    pub counts: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub read: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

/// Build the service router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session).delete(delete_session))
        .route("/entities/:id", put(put_entity))
        .route(
            "/entities/:id/reactions",
            post(react).delete(unreact).get(get_reactions),
        )
        .route("/polls/:id/votes", post(vote).get(poll_tallies))
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .with_state(state)
}

/// Admission gate applied to every route before any handler runs.
pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let class = EndpointClass::classify(request.method(), request.uri().path());
    let client = client_key(&request);

    match state.admission.admit(&client, class).await {
        Admission::Admitted { .. } => next.run(request).await,
        Admission::Rejected { retry_after } => {
            CoreError::RateExceeded { retry_after }.into_response()
        }
    }
}

/// Client key for admission: X-Forwarded-For, then X-Real-IP, then the
/// connection's peer address.
fn client_key(request: &Request) -> String {
    let headers = request.headers();

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        // Take the first hop (original client)
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return ip.to_string();
        }
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "engagement-core",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Issue a session for an upstream-verified principal.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), CoreError> {
    if req.user_id.trim().is_empty() {
        return Err(CoreError::InvalidEntity("user_id is empty".to_string()));
    }
    let session = state
        .guard
        .create_session(&req.user_id, state.config.session.ttl())
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Invalidate the presented session (logout).
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<InvalidateResponse>, CoreError> {
    let invalidated = state.guard.invalidate(bearer_token(&headers)).await?;
    Ok(Json(InvalidateResponse { invalidated }))
}

/// Register an engageable entity owned by the caller.
pub async fn put_entity(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<EntityRequest>,
) -> Result<(StatusCode, Json<EntityCreated>), CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;

    let entity = match req.poll {
        Some(poll) => EngageableEntity::new_poll(
            entity_id.clone(),
            identity.user_id.clone(),
            poll.options,
            poll.expires_at,
        )?,
        None => EngageableEntity::new_post(entity_id.clone(), identity.user_id.clone()),
    };
    state.ledger.put_entity(entity).await?;

    Ok((
        StatusCode::CREATED,
        Json(EntityCreated {
            entity_id,
            owner_id: identity.user_id,
        }),
    ))
}

/// React to an entity (idempotent upsert with toggle-off).
pub async fn react(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ReactRequest>,
) -> Result<Json<ReactionResult>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let reaction_type = req.reaction_type.trim();
    if reaction_type.is_empty() {
        return Err(CoreError::InvalidEntity(
            "reaction_type is empty".to_string(),
        ));
    }
    let outcome = state
        .ledger
        .react(&entity_id, &identity.user_id, reaction_type)
        .await?;
    Ok(Json(outcome))
}

/// Remove the caller's reaction.
pub async fn unreact(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UnreactResponse>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let removed = state.ledger.unreact(&entity_id, &identity.user_id).await?;
    Ok(Json(UnreactResponse { removed }))
}

/// Reaction counts, anonymous-tolerant: the caller's own reaction is
/// included only when a valid session is presented.
pub async fn get_reactions(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ReactionSummary>, CoreError> {
    let viewer = match state.guard.resolve(bearer_token(&headers)).await {
        AuthState::Authenticated(identity) => Some(identity.user_id),
        AuthState::Unauthenticated => None,
    };
    let summary = state.ledger.reactions(&entity_id, viewer.as_deref()).await?;
    Ok(Json(summary))
}

/// Cast or move a single-choice poll vote.
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResult>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let outcome = state
        .ledger
        .vote(&poll_id, req.option_index, &identity.user_id)
        .await?;
    Ok(Json(outcome))
}

/// Vote tallies per option.
pub async fn poll_tallies(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Json<TallyResponse>, CoreError> {
    let counts = state.ledger.count_votes(&poll_id).await?;
    Ok(Json(TallyResponse { counts }))
}

/// The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let notifications = state
        .notifier
        .list_for_user(&identity.user_id, page.skip, page.limit)
        .await?;
    Ok(Json(notifications))
}

/// Mark one of the caller's notifications read.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MarkReadResponse>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    if !state
        .notifier
        .mark_read(&notification_id, &identity.user_id)
        .await?
    {
        return Err(CoreError::NotificationNotFound(notification_id));
    }
    Ok(Json(MarkReadResponse { read: true }))
}

/// Mark all of the caller's notifications read.
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MarkAllReadResponse>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let updated = state.notifier.mark_all_read(&identity.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Count of the caller's unread notifications.
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, CoreError> {
    let identity = state.guard.require_auth(bearer_token(&headers)).await?;
    let unread = state.notifier.count_unread(&identity.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}
