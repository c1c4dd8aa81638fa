//! Authentication flow integration tests

use crate::common::TestApp;

#[tokio::test]
async fn test_register_returns_tokens_and_user() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "username": "listener", "password": "secret1" }),
        )
        .await;
    response.assert_created();

    let json: serde_json::Value = response.json();
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["user"]["username"], "listener");
    // The password hash must never leak
    assert!(json["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_rejects_short_username() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "username": "ab", "password": "secret1" }),
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "username": "listener", "password": "tiny" }),
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let app = TestApp::new().await;

    app.register_and_login("listener", "secret1").await;

    let response = app
        .post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "username": "listener", "password": "secret2" }),
        )
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let app = TestApp::new().await;
    app.register_and_login("listener", "secret1").await;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "username": "listener", "password": "secret1" }),
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert!(json["access_token"].is_string());
    assert_eq!(json["user"]["username"], "listener");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register_and_login("listener", "secret1").await;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "username": "listener", "password": "wrong" }),
        )
        .await;
    response.assert_unauthorized();
}

#[tokio::test]
async fn test_login_unknown_user_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            serde_json::json!({ "username": "ghost", "password": "secret1" }),
        )
        .await;
    response.assert_unauthorized();
}

#[tokio::test]
async fn test_refresh_token_issues_new_access_token() {
    let app = TestApp::new().await;

    let register = app
        .post_json(
            "/api/v1/auth/register",
            serde_json::json!({ "username": "listener", "password": "secret1" }),
        )
        .await;
    register.assert_created();
    let refresh_token = register.json::<serde_json::Value>()["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .post_json(
            "/api/v1/auth/refresh",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert!(json["access_token"].is_string());
    assert_eq!(json["token_type"], "Bearer");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::new().await;
    let access_token = app.register_and_login("listener", "secret1").await;

    // An access token is not accepted where a refresh token is expected
    let response = app
        .post_json(
            "/api/v1/auth/refresh",
            serde_json::json!({ "refresh_token": access_token }),
        )
        .await;
    response.assert_unauthorized();
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = TestApp::new().await;
    let token = app.register_and_login("listener", "secret1").await;

    let response = app.get_auth("/api/v1/auth/me", &token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["username"], "listener");
    assert!(json["id"].is_string());
}

#[tokio::test]
async fn test_garbage_bearer_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.get_auth("/api/v1/auth/me", "not-a-jwt").await;
    response.assert_unauthorized();
}
