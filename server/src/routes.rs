//! HTTP route handlers for the Pulseboard server.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `POST /api/auth/login` - Mock email login
//! - `POST /api/teams/create`, `POST /api/teams/join`, `GET /api/teams` - Team CRUD
//! - `GET|POST /api/gigs` - Gig board
//! - `GET /api/mentors`, `POST /api/mentors/book` - Mentor directory
//! - `POST /api/checkin` - Team check-in (+5 points, triggers broadcast)
//! - `POST /api/points/award` - Arbitrary points award (triggers broadcast)
//! - `GET /api/leaderboard` - Current ranked leaderboard
//! - `POST /api/judging/score`, `GET /api/judging/summary` - Judging
//! - `GET|POST /api/broadcasts` - Announcement feed
//! - `GET /ws` - WebSocket subscription for live leaderboard snapshots
//! - `GET /health` - Health check
//!
//! # Architecture
//!
//! All routes share application state through [`AppState`]: the configuration,
//! the in-memory [`EventStore`] behind an `RwLock`, the subscriber registry,
//! and the optional upstream delegate client.
//!
//! Every mutating operation that can move the leaderboard (team creation,
//! check-in, award, judge score) commits its change and computes the snapshot
//! under the same write guard, then fans the snapshot out before responding.
//! Subscribers therefore always see a leaderboard consistent with the mutation
//! that triggered it.

use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broadcast::SubscriberRegistry;
use crate::config::Config;
use crate::error::Result;
use crate::store::EventStore;
use crate::types::Snapshot;
use crate::upstream::{UpstreamClient, UpstreamError};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
///
/// Cloned per request; all clones share the same store and registry.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// All mutable server state.
    pub store: Arc<RwLock<EventStore>>,

    /// Registry of live leaderboard subscribers.
    pub registry: SubscriberRegistry,

    /// Upstream delegate, present only when configured. When set, delegable
    /// calls bypass the local store entirely.
    pub upstream: Option<Arc<UpstreamClient>>,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates application state from configuration, building the upstream
    /// client when a delegate URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if the upstream HTTP client
    /// cannot be constructed.
    pub fn new(config: Config) -> std::result::Result<Self, UpstreamError> {
        let upstream = match &config.upstream_url {
            Some(url) => Some(Arc::new(UpstreamClient::new(
                url.clone(),
                config.upstream_token.clone(),
            )?)),
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(EventStore::new())),
            registry: SubscriberRegistry::new(),
            upstream,
            start_time: Instant::now(),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("upstream", &self.upstream.is_some())
            .field("start_time", &self.start_time)
            .finish()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/api/auth/login", post(post_login))
        .route("/api/teams/create", post(post_create_team))
        .route("/api/teams/join", post(post_join_team))
        .route("/api/teams", get(get_teams))
        .route("/api/gigs", get(get_gigs).post(post_gig))
        .route("/api/mentors", get(get_mentors))
        .route("/api/mentors/book", post(post_book_mentor))
        .route("/api/checkin", post(post_checkin))
        .route("/api/points/award", post(post_award_points))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/judging/score", post(post_judge_score))
        .route("/api/judging/summary", get(get_judge_summary))
        .route(
            "/api/broadcasts",
            get(get_announcements).post(post_announcement),
        )
        .route("/ws", get(get_ws))
        .route("/health", get(get_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the CORS layer from configured origins.
///
/// An empty origin list allows any origin (demo posture).
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginBody {
    email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateTeamBody {
    team_name: String,
}

#[derive(Debug, Deserialize)]
struct JoinTeamBody {
    team_id: String,
}

fn default_reward_points() -> i64 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
struct GigBody {
    title: String,
    description: String,
    #[serde(default = "default_reward_points")]
    reward_points: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MentorBookBody {
    mentor_id: String,
    slot: String,
    team_id: String,
}

#[derive(Debug, Deserialize)]
struct CheckinBody {
    team_id: String,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AwardBody {
    team_id: String,
    points: i64,
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnouncementBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct JudgeScoreBody {
    team_id: String,
    judge: String,
    category: String,
    score: i64,
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serializes a record and merges `"ok": true` into the resulting object.
fn ok_body<T: Serialize>(record: &T) -> Json<Value> {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("ok".to_string(), Value::Bool(true));
    }
    Json(value)
}

/// Forwards the request to the upstream delegate and returns its JSON
/// response unmodified.
async fn delegate(
    upstream: &UpstreamClient,
    method: Method,
    path: &str,
    json: Option<&Value>,
) -> Result<Json<Value>> {
    let value = upstream.forward(method, path, json, None).await?;
    Ok(Json(value))
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/auth/login - mock email login, idempotent per email.
async fn post_login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>> {
    let (user_id, email) = state.store.write().await.login(&body.email)?;
    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "email": email,
    })))
}

// ============================================================================
// Teams
// ============================================================================

/// POST /api/teams/create - create a team (delegable, triggers broadcast).
async fn post_create_team(
    State(state): State<AppState>,
    Json(body): Json<CreateTeamBody>,
) -> Result<Response> {
    if let Some(upstream) = &state.upstream {
        let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
        let response = delegate(upstream, Method::POST, "/teams/create", Some(&payload)).await?;
        return Ok(response.into_response());
    }

    let (team, rows) = {
        let mut store = state.store.write().await;
        let team = store.create_team(body.team_name);
        (team, store.compute_leaderboard())
    };
    state.registry.broadcast(Snapshot::leaderboard(rows)).await;

    info!(team_id = %team.id, team_name = %team.name, "Team created");
    Ok(Json(team).into_response())
}

/// POST /api/teams/join - add a member label to an existing team.
async fn post_join_team(
    State(state): State<AppState>,
    Json(body): Json<JoinTeamBody>,
) -> Result<Json<Value>> {
    let team = state.store.write().await.join_team(&body.team_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "team": team })))
}

/// GET /api/teams - all teams in creation order.
async fn get_teams(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(serde_json::to_value(store.teams()).unwrap_or(Value::Null))
}

// ============================================================================
// Gigs
// ============================================================================

/// GET /api/gigs - list gigs (delegable).
async fn get_gigs(State(state): State<AppState>) -> Result<Response> {
    if let Some(upstream) = &state.upstream {
        let response = delegate(upstream, Method::GET, "/gigs", None).await?;
        return Ok(response.into_response());
    }

    let store = state.store.read().await;
    Ok(Json(serde_json::to_value(store.gigs()).unwrap_or(Value::Null)).into_response())
}

/// POST /api/gigs - post a gig (delegable).
async fn post_gig(
    State(state): State<AppState>,
    Json(body): Json<GigBody>,
) -> Result<Response> {
    if let Some(upstream) = &state.upstream {
        let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
        let response = delegate(upstream, Method::POST, "/gigs", Some(&payload)).await?;
        return Ok(response.into_response());
    }

    let gig = state
        .store
        .write()
        .await
        .add_gig(body.title, body.description, body.reward_points);
    Ok(Json(gig).into_response())
}

// ============================================================================
// Mentors
// ============================================================================

/// GET /api/mentors - the seeded mentor directory.
async fn get_mentors(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(serde_json::to_value(store.mentors()).unwrap_or(Value::Null))
}

/// POST /api/mentors/book - book a mentor slot (delegable).
///
/// Bookings are echoed with a generated reference, not stored.
async fn post_book_mentor(
    State(state): State<AppState>,
    Json(body): Json<MentorBookBody>,
) -> Result<Response> {
    if let Some(upstream) = &state.upstream {
        let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
        let response = delegate(upstream, Method::POST, "/mentors/book", Some(&payload)).await?;
        return Ok(response.into_response());
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "booking_id": Uuid::new_v4().to_string(),
        "mentor_id": body.mentor_id,
        "slot": body.slot,
        "team_id": body.team_id,
    }))
    .into_response())
}

// ============================================================================
// Check-in & Points
// ============================================================================

/// POST /api/checkin - record a check-in, award +5, broadcast.
async fn post_checkin(
    State(state): State<AppState>,
    Json(body): Json<CheckinBody>,
) -> Result<Json<Value>> {
    let (record, rows) = {
        let mut store = state.store.write().await;
        let record = store.record_checkin(&body.team_id, body.code);
        (record, store.compute_leaderboard())
    };
    state.registry.broadcast(Snapshot::leaderboard(rows)).await;

    debug!(team_id = %record.team_id, "Check-in recorded");
    Ok(ok_body(&record))
}

/// POST /api/points/award - apply an arbitrary points delta, broadcast.
async fn post_award_points(
    State(state): State<AppState>,
    Json(body): Json<AwardBody>,
) -> Result<Json<Value>> {
    let (total, rows) = {
        let mut store = state.store.write().await;
        let total = store.add_points(&body.team_id, body.points);
        (total, store.compute_leaderboard())
    };
    state.registry.broadcast(Snapshot::leaderboard(rows)).await;

    Ok(Json(serde_json::json!({
        "ok": true,
        "team_id": body.team_id,
        "total_points": total,
    })))
}

/// GET /api/leaderboard - the current ranked leaderboard.
async fn get_leaderboard(State(state): State<AppState>) -> Json<Value> {
    let rows = state.store.read().await.compute_leaderboard();
    Json(serde_json::to_value(rows).unwrap_or(Value::Null))
}

// ============================================================================
// Judging
// ============================================================================

/// POST /api/judging/score - append a judge score, credit points, broadcast.
///
/// Returns 400 for scores outside [0, 10] and 404 for unknown teams; in both
/// cases nothing is mutated and no broadcast fires.
async fn post_judge_score(
    State(state): State<AppState>,
    Json(body): Json<JudgeScoreBody>,
) -> Result<Json<Value>> {
    let (record, rows) = {
        let mut store = state.store.write().await;
        let record = store.record_score(&body.team_id, body.judge, body.category, body.score)?;
        (record, store.compute_leaderboard())
    };
    state.registry.broadcast(Snapshot::leaderboard(rows)).await;

    debug!(team_id = %record.team_id, score = record.score, "Judge score recorded");
    Ok(ok_body(&record))
}

/// GET /api/judging/summary - per-team, per-category averages from the log.
async fn get_judge_summary(State(state): State<AppState>) -> Json<Value> {
    let summary = state.store.read().await.summarize();
    Json(serde_json::to_value(summary).unwrap_or(Value::Null))
}

// ============================================================================
// Announcements
// ============================================================================

/// GET /api/broadcasts - the announcement feed.
async fn get_announcements(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(serde_json::to_value(store.announcements()).unwrap_or(Value::Null))
}

/// POST /api/broadcasts - post an announcement (no leaderboard trigger).
async fn post_announcement(
    State(state): State<AppState>,
    Json(body): Json<AnnouncementBody>,
) -> Json<Value> {
    let announcement = state.store.write().await.add_announcement(body.message);
    Json(serde_json::to_value(announcement).unwrap_or(Value::Null))
}

// ============================================================================
// GET /ws - Live Leaderboard Subscription
// ============================================================================

/// GET /ws - WebSocket subscription endpoint.
///
/// On connect the server immediately pushes one leaderboard snapshot, then a
/// new snapshot on every qualifying mutation. Inbound client messages are
/// absorbed and ignored; the connection ends on client disconnect or
/// transport error.
async fn get_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handles an established WebSocket connection.
///
/// Registers with the subscriber registry (which queues the initial snapshot)
/// and forwards snapshots to the client until it disconnects. Unregistration
/// happens exactly once on the single exit path below, whichever side of the
/// connection fails first.
async fn handle_websocket(socket: axum::extract::ws::WebSocket, state: AppState) {
    use axum::extract::ws::Message;
    use futures_util::{SinkExt, StreamExt};

    let initial = Snapshot::leaderboard(state.store.read().await.compute_leaderboard());
    let (subscriber_id, mut snapshot_rx) = state.registry.register(initial).await;
    info!(subscriber_id = %subscriber_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    // Forward snapshots (the queued initial one first) to the client.
    let forward_task = tokio::spawn(async move {
        while let Some(snapshot) = snapshot_rx.recv().await {
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    if let Err(err) = sender.send(Message::Text(json.into())).await {
                        debug!(error = %err, "Failed to send snapshot to WebSocket client");
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "Failed to serialize snapshot");
                }
            }
        }
    });

    // Absorb inbound messages to keep the connection alive; the client is
    // not required (or expected) to send anything meaningful.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "WebSocket error");
                break;
            }
        }
    }

    forward_task.abort();
    state.registry.unregister(subscriber_id).await;
    info!(subscriber_id = %subscriber_id, "WebSocket client disconnected");
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for the health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Number of active WebSocket subscribers.
    pub connections: usize,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - health check endpoint, no authentication.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed();

    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.registry.subscriber_count().await,
        uptime_seconds: uptime.as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================
