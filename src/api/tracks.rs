//! Catalog track lookup endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    models::TrackDetails,
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/{track_id}", get(get_track))
}

/// Look up a track by its dataset track id
///
/// GET /api/v1/tracks/{track_id}
async fn get_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> AppResult<Json<TrackDetails>> {
    let (index, track) = state
        .catalog
        .find_by_track_id(&track_id)
        .ok_or_else(|| AppError::NotFound(format!("Track not found: {}", track_id)))?;

    Ok(Json(TrackDetails::from_track(index, track)))
}
