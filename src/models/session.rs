//! Listening session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A listening session owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted recommendation state for a session
///
/// Restored into the in-memory engine the first time a session is touched
/// after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub current_genre_group: Option<String>,
    pub fresh_injection_ratio: f64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_genre_group: None,
            fresh_injection_ratio: 0.3,
        }
    }
}

/// A liked track entry for a session
#[derive(Debug, Clone, Serialize)]
pub struct LikedTrack {
    pub track_index: usize,
    pub liked_at: DateTime<Utc>,
}

/// Request to create a new session
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
}
