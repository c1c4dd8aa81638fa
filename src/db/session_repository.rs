//! Session repository - database operations for listening sessions
//!
//! Timestamps are stored as RFC 3339 strings and ids as UUID strings.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::models::{LikedTrack, SessionRecord, SessionState};
use crate::utils::AppError;

pub struct SessionRepository {
    pool: Pool<Sqlite>,
}

impl SessionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create a session and its default state row
    pub async fn create(&self, user_id: Uuid, name: &str) -> Result<SessionRecord, AppError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(name)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;

        let default_state = SessionState::default();
        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, current_genre_group, fresh_injection_ratio)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&default_state.current_genre_group)
        .bind(default_state.fresh_injection_ratio)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SessionRecord {
            id,
            user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// List a user's sessions, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM sessions
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    /// Get a session by id
    pub async fn get(&self, session_id: Uuid) -> Result<Option<SessionRecord>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    /// Delete a session (liked tracks and state cascade)
    ///
    /// Returns whether a row was actually removed.
    pub async fn delete(&self, session_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a session's persisted recommendation state
    pub async fn get_state(&self, session_id: Uuid) -> Result<SessionState, AppError> {
        let row = sqlx::query(
            r#"
            SELECT current_genre_group, fresh_injection_ratio
            FROM session_state
            WHERE session_id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SessionState {
                current_genre_group: row.try_get("current_genre_group")?,
                fresh_injection_ratio: row.try_get("fresh_injection_ratio")?,
            }),
            None => Ok(SessionState::default()),
        }
    }

    /// Persist the session's current genre group
    pub async fn set_current_genre(
        &self,
        session_id: Uuid,
        group: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, current_genre_group)
            VALUES (?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                current_genre_group = excluded.current_genre_group
            "#,
        )
        .bind(session_id.to_string())
        .bind(group)
        .execute(&self.pool)
        .await?;

        self.touch(session_id).await
    }

    /// Persist the session's fresh injection ratio
    pub async fn set_injection_ratio(
        &self,
        session_id: Uuid,
        ratio: f64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, fresh_injection_ratio)
            VALUES (?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                fresh_injection_ratio = excluded.fresh_injection_ratio
            "#,
        )
        .bind(session_id.to_string())
        .bind(ratio)
        .execute(&self.pool)
        .await?;

        self.touch(session_id).await
    }

    /// Record a liked track; repeat likes of the same track are no-ops
    pub async fn add_liked_track(
        &self,
        session_id: Uuid,
        track_index: usize,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO session_liked_tracks (session_id, track_index, liked_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(session_id.to_string())
        .bind(track_index as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.touch(session_id).await
    }

    /// Liked tracks for a session, in like order
    pub async fn liked_tracks(&self, session_id: Uuid) -> Result<Vec<LikedTrack>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT track_index, liked_at
            FROM session_liked_tracks
            WHERE session_id = ?
            ORDER BY id
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LikedTrack {
                    track_index: row.try_get::<i64, _>("track_index")? as usize,
                    liked_at: parse_timestamp(&row.try_get::<String, _>("liked_at")?)?,
                })
            })
            .collect()
    }

    /// Bump a session's updated_at timestamp
    pub async fn touch(&self, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_session(row: &SqliteRow) -> Result<SessionRecord, AppError> {
    Ok(SessionRecord {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
        name: row.try_get("name")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Database(format!("Invalid UUID in database: {}", e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp in database: {}", e)))
}
