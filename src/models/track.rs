//! Track model

use serde::{Deserialize, Serialize};

/// A track in the catalog with its audio feature profile
///
/// Feature values on the 0-1 scale (danceability, energy, speechiness,
/// valence, acousticness, instrumentalness, liveness) come straight from the
/// source dataset; tempo is in BPM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub track_name: String,
    pub artists: String,
    pub track_genre: String,
    pub danceability: f64,
    pub energy: f64,
    pub speechiness: f64,
    pub valence: f64,
    pub tempo: f64,
    #[serde(default)]
    pub acousticness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
    #[serde(default)]
    pub liveness: f64,
}

/// Track details returned by the API
///
/// Carries the catalog row index so clients can reference the track in
/// like requests.
#[derive(Debug, Clone, Serialize)]
pub struct TrackDetails {
    pub track_index: usize,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub genre: String,
    pub danceability: f64,
    pub energy: f64,
    pub speechiness: f64,
    pub valence: f64,
    pub tempo: f64,
}

impl TrackDetails {
    /// Build API-facing details from a catalog track and its row index
    pub fn from_track(track_index: usize, track: &Track) -> Self {
        Self {
            track_index,
            track_id: track.track_id.clone(),
            track_name: track.track_name.clone(),
            artist_name: track.artists.clone(),
            genre: track.track_genre.clone(),
            danceability: track.danceability,
            energy: track.energy,
            speechiness: track.speechiness,
            valence: track.valence,
            tempo: track.tempo,
        }
    }
}
