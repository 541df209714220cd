//! Tournament API handlers.
//!
//! This module provides HTTP endpoints for the bracket engine:
//! - Creating and listing tournaments, reading bracket snapshots
//! - Registering and unregistering participants
//! - Participant posts, addressed by match or by battle channel
//! - Votes and organizer decisions
//!
//! Every `{id}` path segment accepts `current` for the current tournament.
//!
//! # Examples
//!
//! Register for the current tournament:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tournaments/current/participants \
//!   -H "Content-Type: application/json" \
//!   -d '{"participant_id": "u42", "display_name": "Ada"}'
//! ```
//!
//! Decide a match:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tournaments/current/matches/R1M1/end \
//!   -H "x-organizer-role: organizer" \
//!   -H "Content-Type: application/json" \
//!   -d '{"winner": "p1"}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tourney::{
    BracketPlan,
    lifecycle::VoteTally,
    store::StoreError,
    tournament::{
        ConfigurationError, EngineError, Fixture, Match, MatchError, Participant, ParticipantId,
        RegistrationError, Side, Tournament, TournamentId, TournamentSummary,
    },
};

use super::{AppState, request_id::RequestId};
use crate::logging;

/// Path alias for the current tournament
pub const CURRENT_ALIAS: &str = "current";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error, rendered as a status code plus [`ErrorResponse`]
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Forbidden,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        ApiError::Engine(e.into())
    }
}

/// HTTP status for an engine error
pub fn status_for(e: &EngineError) -> StatusCode {
    match e {
        EngineError::Registration(RegistrationError::NotRegistered) => StatusCode::NOT_FOUND,
        EngineError::Registration(_) => StatusCode::CONFLICT,
        EngineError::Build(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Match(MatchError::NotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::Match(MatchError::InvalidWinnerToken(_)) => StatusCode::BAD_REQUEST,
        EngineError::Match(MatchError::NotParticipant(_)) => StatusCode::FORBIDDEN,
        EngineError::Match(MatchError::EmptySlot(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Match(_) => StatusCode::CONFLICT,
        EngineError::Configuration(ConfigurationError::Invalid { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::TournamentNotFound(_)
        | EngineError::NoCurrentTournament
        | EngineError::RoundNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidState { .. } => StatusCode::CONFLICT,
        EngineError::ActorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Engine(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::error!("Command failed: {}", e);
                }
                (status, e.client_message())
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Organizer role required".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Resolve the `current` alias
async fn resolve_id(state: &AppState, id: String) -> ApiResult<TournamentId> {
    if id == CURRENT_ALIAS {
        Ok(state.manager.current_tournament_id().await?)
    } else {
        Ok(id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub name: String,
    /// Participant cap, 0 or absent for unlimited
    #[serde(default)]
    pub max_participants: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub participant_id: ParticipantId,
    /// Defaults to the participant ID
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub participant_id: ParticipantId,
    /// When the post was made, defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub voter_id: ParticipantId,
    /// `p1` or `p2`
    pub choice: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenVoteParams {
    /// Window length, defaults to the configured vote window
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EndMatchRequest {
    /// `p1` or `p2`
    pub winner: String,
}

#[derive(Debug, Serialize)]
pub struct ChampionResponse {
    pub champion: Option<ParticipantId>,
}

/// List every stored tournament.
pub async fn list_tournaments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TournamentSummary>>> {
    Ok(Json(state.manager.list_tournaments().await?))
}

/// Read-only bracket snapshot: participants, rounds and every match with its state.
///
/// # Errors
///
/// - `404 Not Found`: Unknown tournament, or no current tournament
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Tournament>> {
    let id = resolve_id(&state, id).await?;
    Ok(Json(state.manager.snapshot(&id).await?))
}

/// Create a tournament and make it current (organizer).
pub async fn create_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CreateTournamentRequest>,
) -> ApiResult<(StatusCode, Json<TournamentSummary>)> {
    let summary = state
        .manager
        .create_tournament(request.name, request.max_participants)
        .await?;

    logging::log_organizer_command("create_tournament", &summary.id, request_id.as_str());
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Make a tournament current (organizer).
pub async fn set_current(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.set_current(&id).await?;

    logging::log_organizer_command("set_current", &id, request_id.as_str());
    Ok(StatusCode::NO_CONTENT)
}

/// Register a participant.
///
/// # Errors
///
/// - `409 Conflict`: Registration closed, tournament full, or already registered
pub async fn register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Participant>)> {
    let id = resolve_id(&state, id).await?;
    let display_name = request
        .display_name
        .unwrap_or_else(|| request.participant_id.clone());

    let participant = state
        .manager
        .register(&id, request.participant_id, display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

/// Withdraw a participant while registration is open.
pub async fn unregister(
    State(state): State<AppState>,
    Path((id, participant_id)): Path<(String, String)>,
) -> ApiResult<Json<Participant>> {
    let id = resolve_id(&state, id).await?;
    Ok(Json(state.manager.unregister(&id, participant_id).await?))
}

/// Announce open registration (organizer).
pub async fn open_registration(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = resolve_id(&state, id).await?;
    state.manager.open_registration(&id).await?;

    logging::log_organizer_command("open_registration", &id, request_id.as_str());
    Ok(StatusCode::NO_CONTENT)
}

/// Freeze the participant list and build the bracket (organizer).
///
/// # Errors
///
/// - `409 Conflict`: Registration already closed
/// - `422 Unprocessable Entity`: Fewer than two participants
pub async fn close_registration(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<Json<BracketPlan>> {
    let id = resolve_id(&state, id).await?;
    let plan = state.manager.close_registration(&id).await?;

    logging::log_organizer_command("close_registration", &id, request_id.as_str());
    Ok(Json(plan))
}

/// Bind a round's matches to battle channels (organizer).
///
/// `round_index` counts the preliminary round, when present, as round 0.
pub async fn assign_fixtures(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((id, round_index)): Path<(String, usize)>,
) -> ApiResult<Json<Vec<Fixture>>> {
    let id = resolve_id(&state, id).await?;
    let fixtures = state.manager.assign_fixtures(&id, round_index).await?;

    logging::log_organizer_command("assign_fixtures", &id, request_id.as_str());
    Ok(Json(fixtures))
}

/// Record a participant's post in a match.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not playing in this match
/// - `409 Conflict`: Not the caller's turn, opponent not known yet, or vote running
pub async fn participant_post(
    State(state): State<AppState>,
    Path((id, match_id)): Path<(String, String)>,
    Json(request): Json<PostRequest>,
) -> ApiResult<Json<Match>> {
    let id = resolve_id(&state, id).await?;
    let at = request.timestamp.unwrap_or_else(Utc::now);

    let m = state
        .manager
        .participant_post(&id, match_id, request.participant_id, at)
        .await?;
    Ok(Json(m))
}

/// Record a participant's post in a battle channel.
pub async fn channel_post(
    State(state): State<AppState>,
    Path((id, channel_id)): Path<(String, String)>,
    Json(request): Json<PostRequest>,
) -> ApiResult<Json<Match>> {
    let id = resolve_id(&state, id).await?;
    let at = request.timestamp.unwrap_or_else(Utc::now);

    let m = state
        .manager
        .channel_post(&id, channel_id, request.participant_id, at)
        .await?;
    Ok(Json(m))
}

/// Open a vote window (organizer).
pub async fn open_vote(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((id, match_id)): Path<(String, String)>,
    Query(params): Query<OpenVoteParams>,
) -> ApiResult<Json<Match>> {
    let id = resolve_id(&state, id).await?;
    let window = params.duration_secs.map(Duration::from_secs);

    let m = state.manager.open_vote(&id, match_id, window).await?;
    logging::log_organizer_command("open_vote", &id, request_id.as_str());
    Ok(Json(m))
}

/// Cast a ballot in an open vote.
///
/// # Errors
///
/// - `400 Bad Request`: Choice is not `p1` or `p2`
/// - `409 Conflict`: Already voted, or voting is not open
pub async fn cast_vote(
    State(state): State<AppState>,
    Path((id, match_id)): Path<(String, String)>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteTally>> {
    let id = resolve_id(&state, id).await?;
    let choice: Side = request.choice.parse()?;

    let tally = state
        .manager
        .cast_vote(&id, match_id, request.voter_id, choice)
        .await?;
    Ok(Json(tally))
}

/// Decide a match (organizer). Wins over any vote or timer still pending.
pub async fn end_match(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((id, match_id)): Path<(String, String)>,
    Json(request): Json<EndMatchRequest>,
) -> ApiResult<Json<Match>> {
    let id = resolve_id(&state, id).await?;
    let winner: Side = request.winner.parse()?;

    let m = state.manager.end_match(&id, match_id, winner).await?;
    logging::log_organizer_command("end_match", &id, request_id.as_str());
    Ok(Json(m))
}

/// Finish the tournament (organizer).
pub async fn end_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> ApiResult<Json<ChampionResponse>> {
    let id = resolve_id(&state, id).await?;
    let champion = state.manager.end_tournament(&id).await?;

    logging::log_organizer_command("end_tournament", &id, request_id.as_str());
    Ok(Json(ChampionResponse { champion }))
}
