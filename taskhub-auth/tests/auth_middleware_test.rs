mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use serde_json::json;
use taskhub_auth::db::CredentialStore;

#[tokio::test]
async fn missing_header_is_rejected() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/users/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Missing or invalid Authorization header");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/users/profile", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn expired_session_is_rejected() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    app.clock.advance(Duration::days(7));

    let (status, body) = app.get("/users/profile", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session expired. Please log in again");
}

#[tokio::test]
async fn session_is_valid_until_expiry() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    app.clock.advance(Duration::days(7) - Duration::seconds(1));

    let (status, _) = app.get("/users/profile", Some(&user.token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn purpose_scoped_tokens_do_not_open_the_gate() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    // Password-reset token
    app.post(
        "/auth/forgot-password",
        None,
        json!({ "email": "ada@example.com" }),
    )
    .await;
    let reset = app.token_from_last_email("ada@example.com");
    let (status, _) = app.get("/users/profile", Some(&reset)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Invite token
    let inviter = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&inviter, "Acme").await;
    app.post(
        &format!("/workspaces/{}/invite-member", workspace_id),
        Some(&inviter.token),
        json!({ "email": user.email }),
    )
    .await;
    let invite = app.token_from_last_email("ada@example.com");
    let (status, _) = app.get("/users/profile", Some(&invite)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    let mut config = common::test_config();
    config.tokens.secret = "a-completely-different-secret-for-this-test-0001".to_string();
    let other = TestApp::spawn_with(config);

    let (status, _) = other.get("/users/profile", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rotated_secret_still_verifies_old_sessions() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;
    let old_secret = common::test_config().tokens.secret;

    let mut config = common::test_config();
    config.tokens.secret = "the-new-primary-secret-after-rotation-000000001".to_string();
    config.tokens.previous_secrets = vec![old_secret];
    let rotated = TestApp::spawn_with(config);
    // Stores are per app, so copy the account across.
    let stored = app
        .state
        .stores
        .credentials
        .find_by_id(&user.id)
        .await
        .unwrap()
        .unwrap();
    rotated
        .state
        .stores
        .credentials
        .insert_if_absent(&stored)
        .await
        .unwrap();

    let (status, body) = rotated.get("/users/profile", Some(&user.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.as_str());
}

#[tokio::test]
async fn session_for_missing_user_is_rejected() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    // A fresh app shares the secret but not the stores.
    let other = TestApp::spawn();
    let (status, _) = other.get("/users/profile", Some(&user.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
