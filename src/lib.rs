//! SoundSift Library
//!
//! Core functionality for the SoundSift music recommendation service:
//! a track catalog, per-session steering engines and the HTTP API
//! around them.

use std::sync::Arc;

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use catalog::Catalog;
pub use config::AppConfig;
pub use db::DbPool;
pub use engine::EngineRegistry;
pub use middleware::{auth_middleware, AuthUser};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Immutable track catalog
    pub catalog: Arc<Catalog>,
    /// Per-session recommendation engines
    pub engines: EngineRegistry,
}
