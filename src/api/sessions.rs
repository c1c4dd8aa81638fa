//! Listening session endpoints
//!
//! Sessions are owned by the authenticated user; requests for another
//! user's session return 404 rather than revealing its existence. The
//! in-memory engine for a session is created lazily from its persisted
//! state on first touch.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::SessionRepository,
    engine::{AdjustOutcome, AdjustmentRecord, PoolStats, SelectionStrategy},
    middleware::AuthUser,
    models::{CreateSessionRequest, LikedTrack, SessionRecord, TrackDetails},
    utils::{validation, AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/{id}", get(get_session).delete(delete_session))
        .route("/{id}/genre", get(get_genre).put(set_genre))
        .route("/{id}/track", get(next_track))
        .route("/{id}/like", post(like_track))
        .route("/{id}/likes", get(list_likes))
        .route("/{id}/adjust", post(adjust))
        .route("/{id}/stats", get(stats))
        .route("/{id}/history", get(history))
        .route("/{id}/reset", post(reset))
        .route(
            "/{id}/config/injection",
            get(get_injection_ratio).put(set_injection_ratio),
        )
        .route(
            "/{id}/config/selection",
            get(get_selection_strategy).put(set_selection_strategy),
        )
}

/// Fetch a session and verify the caller owns it
async fn owned_session(
    state: &AppState,
    auth_user: &AuthUser,
    session_id: Uuid,
) -> Result<SessionRecord, AppError> {
    let repo = SessionRepository::new(state.db.clone());
    let session = repo
        .get(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.user_id != auth_user.id {
        // Hide other users' sessions entirely
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    Ok(session)
}

/// Get the live engine for a session, restoring persisted state on first touch
async fn session_engine(
    state: &AppState,
    session_id: Uuid,
) -> Result<std::sync::Arc<tokio::sync::Mutex<crate::engine::PoolEngine>>, AppError> {
    let repo = SessionRepository::new(state.db.clone());
    let persisted = repo.get_state(session_id).await?;
    Ok(state.engines.get_or_create(session_id, Some(&persisted)).await)
}

/// Create a session
///
/// POST /api/v1/sessions
async fn create_session(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<SessionRecord>)> {
    let name = payload
        .name
        .unwrap_or_else(|| "Listening session".to_string());
    let name = name.trim();
    if !validation::validate_session_name(name) {
        return Err(AppError::ValidationError(
            "Session name must be 1-100 characters".to_string(),
        ));
    }

    let repo = SessionRepository::new(state.db.clone());
    let session = repo.create(auth_user.id, name).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// List the caller's sessions
///
/// GET /api/v1/sessions
async fn list_sessions(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<SessionRecord>>> {
    let repo = SessionRepository::new(state.db.clone());
    let sessions = repo.list_for_user(auth_user.id).await?;
    Ok(Json(sessions))
}

/// Get a session
///
/// GET /api/v1/sessions/{id}
async fn get_session(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionRecord>> {
    let session = owned_session(&state, &auth_user, id).await?;
    Ok(Json(session))
}

/// Delete a session along with its engine and persisted state
///
/// DELETE /api/v1/sessions/{id}
async fn delete_session(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    owned_session(&state, &auth_user, id).await?;

    let repo = SessionRepository::new(state.db.clone());
    repo.delete(id).await?;
    state.engines.remove(id).await;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetGenreRequest {
    pub group: String,
}

#[derive(Debug, Serialize)]
pub struct GenreResponse {
    pub group: Option<String>,
    pub pool_size: usize,
}

/// Get the session's current genre group
///
/// GET /api/v1/sessions/{id}/genre
async fn get_genre(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GenreResponse>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let engine = engine.lock().await;
    Ok(Json(GenreResponse {
        group: engine.genre_group().map(String::from),
        pool_size: engine.stats().genre_pool_size,
    }))
}

/// Select the session's genre group
///
/// PUT /api/v1/sessions/{id}/genre
async fn set_genre(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetGenreRequest>,
) -> AppResult<Json<GenreResponse>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let pool_size = engine.lock().await.set_genre_pool(&payload.group)?;

    // Persist so the selection survives restarts
    let repo = SessionRepository::new(state.db.clone());
    repo.set_current_genre(id, Some(&payload.group)).await?;

    Ok(Json(GenreResponse {
        group: Some(payload.group),
        pool_size,
    }))
}

/// Serve the next recommended track
///
/// GET /api/v1/sessions/{id}/track
async fn next_track(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TrackDetails>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let track = engine.lock().await.next_track()?;
    Ok(Json(track))
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub track_index: usize,
}

/// Record a liked track
///
/// POST /api/v1/sessions/{id}/like
async fn like_track(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LikeRequest>,
) -> AppResult<(StatusCode, Json<TrackDetails>)> {
    owned_session(&state, &auth_user, id).await?;

    let track = state
        .catalog
        .track(payload.track_index)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Invalid track index: {}", payload.track_index))
        })?;

    let repo = SessionRepository::new(state.db.clone());
    repo.add_liked_track(id, payload.track_index).await?;

    Ok((
        StatusCode::CREATED,
        Json(TrackDetails::from_track(payload.track_index, track)),
    ))
}

#[derive(Debug, Serialize)]
pub struct LikedTrackResponse {
    #[serde(flatten)]
    pub track: TrackDetails,
    pub liked_at: chrono::DateTime<chrono::Utc>,
}

/// List liked tracks with their details
///
/// GET /api/v1/sessions/{id}/likes
async fn list_likes(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<LikedTrackResponse>>> {
    owned_session(&state, &auth_user, id).await?;

    let repo = SessionRepository::new(state.db.clone());
    let likes = repo.liked_tracks(id).await?;

    let tracks = likes
        .into_iter()
        .filter_map(|LikedTrack { track_index, liked_at }| {
            state.catalog.track(track_index).map(|track| LikedTrackResponse {
                track: TrackDetails::from_track(track_index, track),
                liked_at,
            })
        })
        .collect();

    Ok(Json(tracks))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub adjustment: u8,
}

/// Apply a directional feature adjustment
///
/// POST /api/v1/sessions/{id}/adjust
async fn adjust(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustRequest>,
) -> AppResult<Json<AdjustOutcome>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let outcome = engine.lock().await.adjust(payload.adjustment)?;

    let repo = SessionRepository::new(state.db.clone());
    repo.touch(id).await?;

    Ok(Json(outcome))
}

/// Pool statistics for the session
///
/// GET /api/v1/sessions/{id}/stats
async fn stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PoolStats>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let stats = engine.lock().await.stats();
    Ok(Json(stats))
}

/// Adjustment history, oldest first
///
/// GET /api/v1/sessions/{id}/history
async fn history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<AdjustmentRecord>>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let history = engine.lock().await.history().to_vec();
    Ok(Json(history))
}

/// Clear filters, history and shown tracks for the session
///
/// POST /api/v1/sessions/{id}/reset
async fn reset(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PoolStats>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let mut engine = engine.lock().await;
    engine.reset();
    Ok(Json(engine.stats()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InjectionRatioBody {
    pub fresh_injection_ratio: f64,
}

/// Get the session's fresh injection ratio
///
/// GET /api/v1/sessions/{id}/config/injection
async fn get_injection_ratio(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InjectionRatioBody>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let ratio = engine.lock().await.injection_ratio();
    Ok(Json(InjectionRatioBody {
        fresh_injection_ratio: ratio,
    }))
}

/// Set the session's fresh injection ratio
///
/// PUT /api/v1/sessions/{id}/config/injection
async fn set_injection_ratio(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InjectionRatioBody>,
) -> AppResult<Json<InjectionRatioBody>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    engine
        .lock()
        .await
        .set_injection_ratio(payload.fresh_injection_ratio)?;

    let repo = SessionRepository::new(state.db.clone());
    repo.set_injection_ratio(id, payload.fresh_injection_ratio)
        .await?;

    Ok(Json(payload))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionStrategyBody {
    pub strategy: SelectionStrategy,
}

/// Get the session's track selection strategy
///
/// GET /api/v1/sessions/{id}/config/selection
async fn get_selection_strategy(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SelectionStrategyBody>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    let strategy = engine.lock().await.selection_strategy();
    Ok(Json(SelectionStrategyBody { strategy }))
}

/// Set the session's track selection strategy
///
/// PUT /api/v1/sessions/{id}/config/selection
async fn set_selection_strategy(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectionStrategyBody>,
) -> AppResult<Json<SelectionStrategyBody>> {
    owned_session(&state, &auth_user, id).await?;

    let engine = session_engine(&state, id).await?;
    engine.lock().await.set_selection_strategy(payload.strategy);
    Ok(Json(payload))
}
