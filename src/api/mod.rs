//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};

use crate::AppState;

mod auth;
mod genres;
mod health;
mod sessions;
mod tracks;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Authentication endpoints (no auth required)
        .nest("/auth", auth::public_routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        // Protected auth endpoints (me)
        .nest("/auth", auth::protected_routes())
        // Listening sessions and recommendation endpoints
        .nest("/sessions", sessions::routes())
        // Genre group discovery
        .nest("/genres", genres::routes())
        // Catalog track lookup
        .nest("/tracks", tracks::routes())
}
