//! Genre discovery endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{catalog::GENRE_GROUPS, utils::AppResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_genre_groups))
        .route("/random", get(random_genres))
}

/// A genre group and the dataset genres it covers
#[derive(Debug, Serialize)]
pub struct GenreGroupResponse {
    pub name: String,
    pub genres: Vec<String>,
}

/// List all genre groups
///
/// GET /api/v1/genres
async fn list_genre_groups() -> Json<Vec<GenreGroupResponse>> {
    let groups = GENRE_GROUPS
        .iter()
        .map(|(name, genres)| GenreGroupResponse {
            name: name.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        })
        .collect();

    Json(groups)
}

#[derive(Debug, Deserialize)]
pub struct RandomGenresQuery {
    #[serde(default = "default_random_count")]
    pub count: usize,
}

fn default_random_count() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct RandomGenresResponse {
    pub genres: Vec<String>,
}

/// Pick random dataset genres for discovery
///
/// GET /api/v1/genres/random?count=5
async fn random_genres(
    State(state): State<AppState>,
    Query(query): Query<RandomGenresQuery>,
) -> AppResult<Json<RandomGenresResponse>> {
    let count = query.count.clamp(1, 50);
    let mut rng = rand::thread_rng();
    let genres = state.catalog.random_genres(count, &mut rng);

    Ok(Json(RandomGenresResponse { genres }))
}
