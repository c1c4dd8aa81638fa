//! API integration tests
//!
//! Tests the public endpoints and access control with real HTTP requests
//! against a test router.

use crate::common::TestApp;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["components"]["catalog"]["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = TestApp::new().await;

    app.get("/api/v1/sessions").await.assert_unauthorized();
    app.get("/api/v1/genres").await.assert_unauthorized();
    app.get("/api/v1/auth/me").await.assert_unauthorized();
}

#[tokio::test]
async fn test_genres_lists_all_groups() {
    let app = TestApp::new().await;
    let token = app.register_and_login("genre_fan", "password1").await;

    let response = app.get_auth("/api/v1/genres", &token).await;
    response.assert_ok();

    let groups: Vec<serde_json::Value> = response.json();
    assert_eq!(groups.len(), 8);
    assert!(groups
        .iter()
        .any(|g| g["name"] == "Country, Folk & Roots"));
    assert!(groups.iter().all(|g| g["genres"].is_array()));
}

#[tokio::test]
async fn test_random_genres_respects_count() {
    let app = TestApp::new().await;
    let token = app.register_and_login("random_fan", "password1").await;

    let response = app.get_auth("/api/v1/genres/random?count=2", &token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    let genres = json["genres"].as_array().unwrap();
    assert_eq!(genres.len(), 2);
}

#[tokio::test]
async fn test_random_genres_default_capped_at_distinct_genres() {
    let app = TestApp::new().await;
    let token = app.register_and_login("default_fan", "password1").await;

    // Default count is 5 but the synthetic catalog only has three genres
    let response = app.get_auth("/api/v1/genres/random", &token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["genres"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_track_lookup_by_id() {
    let app = TestApp::new().await;
    let token = app.register_and_login("track_fan", "password1").await;

    let response = app.get_auth("/api/v1/tracks/country-0", &token).await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["track_id"], "country-0");
    assert_eq!(json["genre"], "country");
    assert!(json["track_index"].is_u64());
}

#[tokio::test]
async fn test_track_lookup_unknown_id_is_404() {
    let app = TestApp::new().await;
    let token = app.register_and_login("lost_fan", "password1").await;

    app.get_auth("/api/v1/tracks/no-such-track", &token)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_not_found_returns_404() {
    let app = TestApp::new().await;
    app.get("/api/v1/nonexistent").await.assert_not_found();
}
