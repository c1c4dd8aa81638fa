//! Session lifecycle and recommendation flow tests
//!
//! Exercises the full loop: create a session, pick a genre group, fetch
//! tracks, steer the pool with adjustments, like tracks and reset.

use crate::common::TestApp;

const COUNTRY: &str = "Country, Folk & Roots";

async fn create_session(app: &TestApp, token: &str, name: &str) -> String {
    let response = app
        .post_json_auth(
            "/api/v1/sessions",
            serde_json::json!({ "name": name }),
            token,
        )
        .await;
    response.assert_created();
    response.json::<serde_json::Value>()["id"]
        .as_str()
        .expect("session response missing id")
        .to_string()
}

async fn set_genre(app: &TestApp, token: &str, session_id: &str, group: &str) {
    app.put_json_auth(
        &format!("/api/v1/sessions/{}/genre", session_id),
        serde_json::json!({ "group": group }),
        token,
    )
    .await
    .assert_ok();
}

#[tokio::test]
async fn test_create_and_get_session() {
    let app = TestApp::new().await;
    let token = app.register_and_login("sessioner", "password1").await;

    let id = create_session(&app, &token, "Road trip").await;

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}", id), &token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["name"], "Road trip");
    assert_eq!(json["id"], id.as_str());
}

#[tokio::test]
async fn test_create_session_with_default_name() {
    let app = TestApp::new().await;
    let token = app.register_and_login("defaulter", "password1").await;

    let response = app
        .post_json_auth("/api/v1/sessions", serde_json::json!({}), &token)
        .await;
    response.assert_created();
    assert_eq!(
        response.json::<serde_json::Value>()["name"],
        "Listening session"
    );
}

#[tokio::test]
async fn test_create_session_rejects_overlong_name() {
    let app = TestApp::new().await;
    let token = app.register_and_login("longname", "password1").await;

    let response = app
        .post_json_auth(
            "/api/v1/sessions",
            serde_json::json!({ "name": "x".repeat(101) }),
            &token,
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_sessions_only_shows_own() {
    let app = TestApp::new().await;
    let alice = app.register_and_login("alice", "password1").await;
    let bob = app.register_and_login("bob", "password1").await;

    create_session(&app, &alice, "Alice one").await;
    create_session(&app, &alice, "Alice two").await;
    create_session(&app, &bob, "Bob one").await;

    let response = app.get_auth("/api/v1/sessions", &alice).await;
    response.assert_ok();
    let sessions: Vec<serde_json::Value> = response.json();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s["name"]
        .as_str()
        .unwrap()
        .starts_with("Alice")));
}

#[tokio::test]
async fn test_other_users_session_is_hidden() {
    let app = TestApp::new().await;
    let alice = app.register_and_login("alice", "password1").await;
    let bob = app.register_and_login("bob", "password1").await;

    let id = create_session(&app, &alice, "Private").await;

    // Bob sees 404, not 403
    app.get_auth(&format!("/api/v1/sessions/{}", id), &bob)
        .await
        .assert_not_found();
    app.get_auth(&format!("/api/v1/sessions/{}/stats", id), &bob)
        .await
        .assert_not_found();
    app.delete_auth(&format!("/api/v1/sessions/{}", id), &bob)
        .await
        .assert_not_found();

    // Alice still owns it
    app.get_auth(&format!("/api/v1/sessions/{}", id), &alice)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_delete_session() {
    let app = TestApp::new().await;
    let token = app.register_and_login("deleter", "password1").await;

    let id = create_session(&app, &token, "Short lived").await;
    let response = app
        .delete_auth(&format!("/api/v1/sessions/{}", id), &token)
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    app.get_auth(&format!("/api/v1/sessions/{}", id), &token)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_set_genre_builds_pool() {
    let app = TestApp::new().await;
    let token = app.register_and_login("genre_setter", "password1").await;
    let id = create_session(&app, &token, "Country night").await;

    let response = app
        .put_json_auth(
            &format!("/api/v1/sessions/{}/genre", id),
            serde_json::json!({ "group": COUNTRY }),
            &token,
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["group"], COUNTRY);
    // The synthetic catalog has ten country tracks
    assert_eq!(json["pool_size"], 10);

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/genre", id), &token)
        .await;
    response.assert_ok();
    assert_eq!(response.json::<serde_json::Value>()["group"], COUNTRY);
}

#[tokio::test]
async fn test_set_unknown_genre_is_bad_request() {
    let app = TestApp::new().await;
    let token = app.register_and_login("bad_genre", "password1").await;
    let id = create_session(&app, &token, "Oops").await;

    app.put_json_auth(
        &format!("/api/v1/sessions/{}/genre", id),
        serde_json::json!({ "group": "Polka Fusion" }),
        &token,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_next_track_requires_genre() {
    let app = TestApp::new().await;
    let token = app.register_and_login("eager", "password1").await;
    let id = create_session(&app, &token, "No genre yet").await;

    app.get_auth(&format!("/api/v1/sessions/{}/track", id), &token)
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_next_track_returns_track_details() {
    let app = TestApp::new().await;
    let token = app.register_and_login("player", "password1").await;
    let id = create_session(&app, &token, "Playback").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/track", id), &token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["genre"], "country");
    assert!(json["track_id"].as_str().unwrap().starts_with("country-"));
    assert!(json["track_index"].is_u64());
    assert!(json["tempo"].is_f64() || json["tempo"].is_u64());
}

#[tokio::test]
async fn test_tracks_are_not_repeated_until_pool_exhausted() {
    let app = TestApp::new().await;
    let token = app.register_and_login("marathon", "password1").await;
    let id = create_session(&app, &token, "Marathon").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    let mut seen = std::collections::HashSet::new();
    for _ in 0..10 {
        let response = app
            .get_auth(&format!("/api/v1/sessions/{}/track", id), &token)
            .await;
        response.assert_ok();
        let track_id = response.json::<serde_json::Value>()["track_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(seen.insert(track_id), "track repeated before pool exhausted");
    }

    // Pool exhausted: the shown set resets and playback continues
    app.get_auth(&format!("/api/v1/sessions/{}/track", id), &token)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_like_and_list_likes() {
    let app = TestApp::new().await;
    let token = app.register_and_login("liker", "password1").await;
    let id = create_session(&app, &token, "Favorites").await;

    let response = app
        .post_json_auth(
            &format!("/api/v1/sessions/{}/like", id),
            serde_json::json!({ "track_index": 0 }),
            &token,
        )
        .await;
    response.assert_created();
    assert_eq!(response.json::<serde_json::Value>()["track_id"], "country-0");

    // Liking the same track twice is idempotent
    app.post_json_auth(
        &format!("/api/v1/sessions/{}/like", id),
        serde_json::json!({ "track_index": 0 }),
        &token,
    )
    .await
    .assert_created();

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/like", id),
        serde_json::json!({ "track_index": 3 }),
        &token,
    )
    .await
    .assert_created();

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/likes", id), &token)
        .await;
    response.assert_ok();

    let likes: Vec<serde_json::Value> = response.json();
    assert_eq!(likes.len(), 2);
    assert_eq!(likes[0]["track_id"], "country-0");
    assert_eq!(likes[1]["track_id"], "country-3");
    assert!(likes[0]["liked_at"].is_string());
}

#[tokio::test]
async fn test_like_invalid_index_is_bad_request() {
    let app = TestApp::new().await;
    let token = app.register_and_login("overreach", "password1").await;
    let id = create_session(&app, &token, "Oops").await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/like", id),
        serde_json::json!({ "track_index": 9999 }),
        &token,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_adjust_narrows_pool() {
    let app = TestApp::new().await;
    let token = app.register_and_login("adjuster", "password1").await;
    let id = create_session(&app, &token, "More energy").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    let response = app
        .post_json_auth(
            &format!("/api/v1/sessions/{}/adjust", id),
            serde_json::json!({ "adjustment": 3 }),
            &token,
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["filter"], "increase_energy");
    assert_eq!(json["applied"], true);
    assert_eq!(json["filters_in_queue"], 1);
    let remaining = json["remaining_tracks"].as_u64().unwrap();
    assert!(remaining > 0 && remaining < 10);
}

#[tokio::test]
async fn test_contradicting_adjustment_cancels() {
    let app = TestApp::new().await;
    let token = app.register_and_login("flipflop", "password1").await;
    let id = create_session(&app, &token, "Indecisive").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 3 }),
        &token,
    )
    .await
    .assert_ok();

    // Decrease-energy cancels the pending increase instead of stacking
    let response = app
        .post_json_auth(
            &format!("/api/v1/sessions/{}/adjust", id),
            serde_json::json!({ "adjustment": 2 }),
            &token,
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["applied"], false);
    assert_eq!(json["filters_in_queue"], 0);
    assert_eq!(json["remaining_tracks"], 10);
}

#[tokio::test]
async fn test_adjust_with_invalid_id_is_bad_request() {
    let app = TestApp::new().await;
    let token = app.register_and_login("outofrange", "password1").await;
    let id = create_session(&app, &token, "Oops").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 10 }),
        &token,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_adjust_requires_genre() {
    let app = TestApp::new().await;
    let token = app.register_and_login("premature", "password1").await;
    let id = create_session(&app, &token, "No pool").await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 1 }),
        &token,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_stats_reflect_session_state() {
    let app = TestApp::new().await;
    let token = app.register_and_login("statistician", "password1").await;
    let id = create_session(&app, &token, "Numbers").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    app.get_auth(&format!("/api/v1/sessions/{}/track", id), &token)
        .await
        .assert_ok();
    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 3 }),
        &token,
    )
    .await
    .assert_ok();

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/stats", id), &token)
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["total_tracks"], 26);
    assert_eq!(json["genre_pool_size"], 10);
    assert_eq!(json["filters_applied"], 1);
    assert_eq!(json["tracks_shown"], 1);
    assert!(json["playback_pool_size"].as_u64().unwrap() < 10);
    assert!(json["pool_reduction_pct"].as_f64().unwrap() > 0.0);
    assert!(json["avg_stats"]["energy"].is_f64() || json["avg_stats"]["energy"].is_u64());
    assert!(json["avg_stats"]["tempo"].is_f64() || json["avg_stats"]["tempo"].is_u64());
}

#[tokio::test]
async fn test_history_records_adjustments() {
    let app = TestApp::new().await;
    let token = app.register_and_login("historian", "password1").await;
    let id = create_session(&app, &token, "Chronicle").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 3 }),
        &token,
    )
    .await
    .assert_ok();
    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 7 }),
        &token,
    )
    .await
    .assert_ok();

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/history", id), &token)
        .await;
    response.assert_ok();

    let history: Vec<serde_json::Value> = response.json();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["adjustment_id"], 3);
    assert_eq!(history[0]["feature"], "energy");
    assert_eq!(history[0]["direction"], "increase");
    assert_eq!(history[1]["adjustment_id"], 7);
    assert!(history[0]["pool_size_before"].as_u64().unwrap() >= history[0]["pool_size_after"].as_u64().unwrap());
}

#[tokio::test]
async fn test_reset_restores_genre_pool() {
    let app = TestApp::new().await;
    let token = app.register_and_login("resetter", "password1").await;
    let id = create_session(&app, &token, "Start over").await;
    set_genre(&app, &token, &id, COUNTRY).await;

    app.post_json_auth(
        &format!("/api/v1/sessions/{}/adjust", id),
        serde_json::json!({ "adjustment": 3 }),
        &token,
    )
    .await
    .assert_ok();

    let response = app
        .post_json_auth(
            &format!("/api/v1/sessions/{}/reset", id),
            serde_json::json!({}),
            &token,
        )
        .await;
    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["filters_applied"], 0);
    assert_eq!(json["tracks_shown"], 0);
    assert_eq!(json["playback_pool_size"], 10);
}

#[tokio::test]
async fn test_injection_ratio_roundtrip() {
    let app = TestApp::new().await;
    let token = app.register_and_login("mixer", "password1").await;
    let id = create_session(&app, &token, "Mix config").await;

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/config/injection", id), &token)
        .await;
    response.assert_ok();
    assert_eq!(
        response.json::<serde_json::Value>()["fresh_injection_ratio"],
        0.3
    );

    let response = app
        .put_json_auth(
            &format!("/api/v1/sessions/{}/config/injection", id),
            serde_json::json!({ "fresh_injection_ratio": 0.5 }),
            &token,
        )
        .await;
    response.assert_ok();

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/config/injection", id), &token)
        .await;
    assert_eq!(
        response.json::<serde_json::Value>()["fresh_injection_ratio"],
        0.5
    );
}

#[tokio::test]
async fn test_injection_ratio_out_of_range_is_rejected() {
    let app = TestApp::new().await;
    let token = app.register_and_login("overmixer", "password1").await;
    let id = create_session(&app, &token, "Too much").await;

    app.put_json_auth(
        &format!("/api/v1/sessions/{}/config/injection", id),
        serde_json::json!({ "fresh_injection_ratio": 1.5 }),
        &token,
    )
    .await
    .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_selection_strategy_roundtrip() {
    let app = TestApp::new().await;
    let token = app.register_and_login("strategist", "password1").await;
    let id = create_session(&app, &token, "Strategy").await;

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/config/selection", id), &token)
        .await;
    response.assert_ok();
    assert_eq!(
        response.json::<serde_json::Value>()["strategy"],
        "average_centered"
    );

    app.put_json_auth(
        &format!("/api/v1/sessions/{}/config/selection", id),
        serde_json::json!({ "strategy": "random" }),
        &token,
    )
    .await
    .assert_ok();

    let response = app
        .get_auth(&format!("/api/v1/sessions/{}/config/selection", id), &token)
        .await;
    assert_eq!(response.json::<serde_json::Value>()["strategy"], "random");
}
