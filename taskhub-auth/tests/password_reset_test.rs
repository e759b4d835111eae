mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{TestApp, TEST_PASSWORD};
use serde_json::json;
use taskhub_auth::{
    db::{CredentialStore, VerificationLedger},
    models::{User, VerificationPurpose},
    services::EmailMessage,
    utils::{hash_password, hash_token, Password},
};

const NEW_PASSWORD: &str = "brand-new-password-42";

async fn request_reset(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .post("/auth/forgot-password", None, json!({ "email": email }))
        .await;
    assert_eq!(status, StatusCode::OK, "forgot-password failed: {}", body);
    assert_eq!(body["message"], "Reset password email sent");
    app.token_from_last_email(email)
}

fn reset_body(token: &str) -> serde_json::Value {
    json!({
        "token": token,
        "newPassword": NEW_PASSWORD,
        "confirmPassword": NEW_PASSWORD,
    })
}

#[tokio::test]
async fn reset_flow_replaces_password() {
    let app = TestApp::spawn();
    app.signup("Ada", "ada@example.com").await;

    let token = request_reset(&app, "ada@example.com").await;
    match app.last_email("ada@example.com") {
        EmailMessage::ResetPassword { link, .. } => {
            assert!(link.starts_with("http://localhost:5173/auth/reset-password?token="))
        }
        other => panic!("unexpected email {:?}", other),
    }

    let (status, body) = app
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password reset successfully");

    let (status, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = TestApp::spawn();
    app.signup("Ada", "ada@example.com").await;
    let token = request_reset(&app, "ada@example.com").await;

    let (status, _) = app
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_token_without_ledger_entry_is_rejected() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;
    let token = request_reset(&app, "ada@example.com").await;

    // Server-side revocation leaves the signature intact.
    let revoked = app
        .state
        .stores
        .verifications
        .take(
            &user.id,
            VerificationPurpose::PasswordReset,
            &hash_token(&token),
        )
        .await
        .unwrap();
    assert!(revoked.is_some());

    let (status, body) = app
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or malformed token");
}

#[tokio::test]
async fn failed_reset_keeps_the_ledger_entry() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;
    let token = request_reset(&app, "ada@example.com").await;
    let entry = app
        .state
        .stores
        .verifications
        .find(&user.id, VerificationPurpose::PasswordReset)
        .await
        .unwrap()
        .unwrap();

    // Same secret and ledger entry, but the account lookup fails.
    let other = TestApp::spawn();
    other
        .state
        .stores
        .verifications
        .insert_if_vacant(&entry, entry.created_at)
        .await
        .unwrap();

    let (status, body) = other
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let kept = other
        .state
        .stores
        .verifications
        .find(&user.id, VerificationPurpose::PasswordReset)
        .await
        .unwrap();
    assert_eq!(kept.map(|e| e.token_hash), Some(hash_token(&token)));
}

#[tokio::test]
async fn second_request_while_pending_is_refused() {
    let app = TestApp::spawn();
    app.signup("Ada", "ada@example.com").await;
    request_reset(&app, "ada@example.com").await;

    let (status, body) = app
        .post(
            "/auth/forgot-password",
            None,
            json!({ "email": "ada@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Reset password request already sent");
}

#[tokio::test]
async fn expired_reset_can_be_requested_again() {
    let app = TestApp::spawn();
    app.signup("Ada", "ada@example.com").await;
    let stale = request_reset(&app, "ada@example.com").await;

    app.clock.advance(Duration::minutes(16));

    let (status, _) = app
        .post("/auth/reset-password", None, reset_body(&stale))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = request_reset(&app, "ada@example.com").await;
    let (status, _) = app
        .post("/auth/reset-password", None, reset_body(&fresh))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let app = TestApp::spawn();

    let (status, body) = app
        .post(
            "/auth/forgot-password",
            None,
            json!({ "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn forgot_password_requires_a_verified_email() {
    let app = TestApp::spawn();
    let hash = hash_password(&Password::new(TEST_PASSWORD)).unwrap();
    let mut pending = User::verified(
        "Ada".to_string(),
        "ada@example.com".to_string(),
        hash,
        chrono::Utc::now(),
    );
    pending.email_verified = false;
    app.state
        .stores
        .credentials
        .insert_if_absent(&pending)
        .await
        .unwrap();
    let sent_before = app.email.sent().len();

    let (status, body) = app
        .post(
            "/auth/forgot-password",
            None,
            json!({ "email": "ada@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please verify your email first");
    assert_eq!(app.email.sent().len(), sent_before);
}

#[tokio::test]
async fn mismatched_confirmation_is_rejected() {
    let app = TestApp::spawn();
    app.signup("Ada", "ada@example.com").await;
    let token = request_reset(&app, "ada@example.com").await;

    let (status, body) = app
        .post(
            "/auth/reset-password",
            None,
            json!({
                "token": token,
                "newPassword": NEW_PASSWORD,
                "confirmPassword": "something-else-entirely",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "New password and confirm password must match");

    // The pending entry is untouched, so the token still works.
    let (status, _) = app
        .post("/auth/reset-password", None, reset_body(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn session_token_cannot_reset_password() {
    let app = TestApp::spawn();
    let user = app.signup("Ada", "ada@example.com").await;

    let (status, body) = app
        .post("/auth/reset-password", None, reset_body(&user.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid token purpose");
}
