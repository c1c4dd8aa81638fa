//! Authentication service
//!
//! Provides password hashing with Argon2 and user account management.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::session_repository::{parse_timestamp, parse_uuid};
use crate::models::User;

/// Authentication service for user management
pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Authenticate a user by username and password
    ///
    /// Updates last_login on success.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.get_user_by_username(username).await?;

        match user {
            Some(mut user) => {
                if Self::verify_password(password, &user.password_hash)? {
                    let now = Utc::now();
                    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
                        .bind(now.to_rfc3339())
                        .bind(user.id.to_string())
                        .execute(&self.pool)
                        .await
                        .context("Failed to record login time")?;
                    user.last_login = Some(now);
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at, updated_at, last_login FROM users WHERE username = ?"
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at, updated_at, last_login FROM users WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by ID")?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Create a new user
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        if self.get_user_by_username(username).await?.is_some() {
            anyhow::bail!("Username already exists");
        }

        let password_hash = Self::hash_password(password)?;
        let user = User::new(username.to_string(), password_hash);

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(user)
    }
}

/// Convert a database row to a User
///
/// Corrupt ids or timestamps are surfaced as errors rather than patched
/// over with placeholder values.
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let last_login: Option<String> = row.try_get("last_login")?;

    Ok(User {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        last_login: last_login.as_deref().map(parse_timestamp).transpose()?,
    })
}
