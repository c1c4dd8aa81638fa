//! Authentication API endpoints
//!
//! Provides registration, login, token refresh and current-user endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    middleware::auth::{
        create_access_token, create_refresh_token, validate_token, AuthUser, TokenType,
    },
    models::{AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest, TokenResponse, UserPublic},
    services::AuthService,
    utils::{validation, AppError, AppResult},
    AppState,
};

/// Create public routes for authentication endpoints (no auth required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
}

/// Create protected routes for authentication endpoints (auth required)
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

/// Register handler
///
/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let username = payload.username.trim();
    if !validation::validate_username(username) {
        return Err(AppError::ValidationError(
            "Username must be 3-50 characters: letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    if !validation::validate_password(&payload.password, state.config.auth.password_min_length) {
        return Err(AppError::ValidationError(format!(
            "Password must be between {} and 128 characters",
            state.config.auth.password_min_length
        )));
    }

    let auth_service = AuthService::new(state.db.clone());

    if auth_service.get_user_by_username(username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let user = auth_service.create_user(username, &payload.password).await?;
    let response = issue_tokens(&state, user.into())?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login handler
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone());

    let user = auth_service
        .authenticate(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

    let response = issue_tokens(&state, user.into())?;
    Ok(Json(response))
}

/// Refresh token handler
///
/// POST /api/v1/auth/refresh
async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token_data = validate_token(&payload.refresh_token, &state.config.auth.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }

    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    // The user must still exist
    let auth_service = AuthService::new(state.db.clone());
    let user = auth_service
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    let access_token = create_access_token(
        &user.id,
        &user.username,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| AppError::Internal(format!("Failed to create access token: {}", e)))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
    }))
}

/// Current user handler
///
/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<UserPublic>> {
    let auth_service = AuthService::new(state.db.clone());
    let user = auth_service
        .get_user_by_id(&auth_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

/// Issue an access/refresh token pair for a user
fn issue_tokens(state: &AppState, user: UserPublic) -> Result<AuthResponse, AppError> {
    let access_token = create_access_token(
        &user.id,
        &user.username,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| AppError::Internal(format!("Failed to create access token: {}", e)))?;

    let refresh_token = create_refresh_token(
        &user.id,
        &user.username,
        &state.config.auth.jwt_secret,
        state.config.auth.refresh_token_expiry_days,
    )
    .map_err(|e| AppError::Internal(format!("Failed to create refresh token: {}", e)))?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
        user,
    })
}
