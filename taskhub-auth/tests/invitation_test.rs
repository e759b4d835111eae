mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use serde_json::json;
use taskhub_auth::{models::ActivityAction, services::EmailMessage};

#[tokio::test]
async fn generated_invite_joins_as_member() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let joiner = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;

    let uri = format!("/workspaces/{}/accept-generate-invite", workspace_id);
    let (status, body) = app.post_empty(&uri, Some(&joiner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully joined the workspace");
    assert_eq!(body["workspaceId"], workspace_id.as_str());
    assert_eq!(body["role"], "MEMBER");

    let (status, body) = app.post_empty(&uri, Some(&joiner.token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You are already a member of this workspace");

    assert!(app
        .activity
        .entries()
        .iter()
        .any(|e| e.action == ActivityAction::JoinedWorkspace && e.user_id == joiner.id));
}

#[tokio::test]
async fn generated_invite_for_unknown_workspace_is_not_found() {
    let app = TestApp::spawn();
    let joiner = app.signup("Bob", "bob@example.com").await;

    let (status, _) = app
        .post_empty("/workspaces/missing/accept-generate-invite", Some(&joiner.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_invite_grants_the_invited_role() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let invitee = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;

    let (status, body) = app
        .post(
            &format!("/workspaces/{}/invite-member", workspace_id),
            Some(&owner.token),
            json!({ "email": "bob@example.com", "role": "ADMIN" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Invitation sent successfully");

    match app.last_email("bob@example.com") {
        EmailMessage::WorkspaceInvite {
            workspace, link, ..
        } => {
            assert_eq!(workspace, "Acme");
            assert!(link.starts_with(&format!(
                "http://localhost:5173/workspace-invite/{}?tk=",
                workspace_id
            )));
        }
        other => panic!("unexpected email {:?}", other),
    }

    let token = app.token_from_last_email("bob@example.com");
    let (status, body) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&invitee.token),
            json!({ "token": token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    let (_, body) = app
        .get(&format!("/workspaces/{}", workspace_id), Some(&owner.token))
        .await;
    let members = body["workspace"]["members"].as_array().unwrap();
    assert!(members
        .iter()
        .any(|m| m["userId"] == invitee.id.as_str() && m["role"] == "ADMIN"));
}

#[tokio::test]
async fn invite_defaults_to_member() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let invitee = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;

    let (status, _) = app
        .post(
            &format!("/workspaces/{}/invite-member", workspace_id),
            Some(&owner.token),
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let token = app.token_from_last_email("bob@example.com");
    let (_, body) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&invitee.token),
            json!({ "token": token }),
        )
        .await;
    assert_eq!(body["role"], "MEMBER");
}

#[tokio::test]
async fn invite_token_is_bound_to_the_invitee() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    app.signup("Bob", "bob@example.com").await;
    let thief = app.signup("Eve", "eve@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;

    app.post(
        &format!("/workspaces/{}/invite-member", workspace_id),
        Some(&owner.token),
        json!({ "email": "bob@example.com", "role": "ADMIN" }),
    )
    .await;
    let token = app.token_from_last_email("bob@example.com");

    let (status, body) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&thief.token),
            json!({ "token": token }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You are not invited to join this workspace");

    let (status, _) = app
        .get(&format!("/workspaces/{}", workspace_id), Some(&thief.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invite_token_is_single_use() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let invitee = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    app.invite_and_accept(&owner, &invitee, &workspace_id, "MEMBER")
        .await;

    let token = app.token_from_last_email("bob@example.com");
    let (status, _) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&invitee.token),
            json!({ "token": token }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_pending_invite_is_refused() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    let uri = format!("/workspaces/{}/invite-member", workspace_id);

    let (status, _) = app
        .post(&uri, Some(&owner.token), json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&uri, Some(&owner.token), json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "User has already been invited to this workspace"
    );
}

#[tokio::test]
async fn expired_invite_can_be_reissued() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    let uri = format!("/workspaces/{}/invite-member", workspace_id);

    app.post(&uri, Some(&owner.token), json!({ "email": "bob@example.com" }))
        .await;
    let stale = app.token_from_last_email("bob@example.com");

    app.clock.advance(Duration::days(8));

    // Sessions issued before the jump have lapsed too.
    let owner = app.login("Ada", "ada@example.com").await;
    let invitee = app.login("Bob", "bob@example.com").await;

    let (status, body) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&invitee.token),
            json!({ "token": stale }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");

    let (status, _) = app
        .post(&uri, Some(&owner.token), json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let fresh = app.token_from_last_email("bob@example.com");
    let (status, _) = app
        .post(
            "/workspaces/accept-invite-token",
            Some(&invitee.token),
            json!({ "token": fresh }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn member_cannot_invite() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let member = app.signup("Bob", "bob@example.com").await;
    app.signup("Cy", "cy@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    app.join_workspace(&member, &workspace_id).await;

    let (status, body) = app
        .post(
            &format!("/workspaces/{}/invite-member", workspace_id),
            Some(&member.token),
            json!({ "email": "cy@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Only workspace owners and admins can invite members"
    );
}

#[tokio::test]
async fn admin_can_invite() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let admin = app.signup("Bob", "bob@example.com").await;
    let newcomer = app.signup("Cy", "cy@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    app.invite_and_accept(&owner, &admin, &workspace_id, "ADMIN")
        .await;

    app.invite_and_accept(&admin, &newcomer, &workspace_id, "VIEWER")
        .await;
}

#[tokio::test]
async fn invites_never_grant_owner() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    let sent_before = app.email.sent().len();

    let (status, _) = app
        .post(
            &format!("/workspaces/{}/invite-member", workspace_id),
            Some(&owner.token),
            json!({ "email": "bob@example.com", "role": "OWNER" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.email.sent().len(), sent_before);
}

#[tokio::test]
async fn inviting_existing_member_or_unknown_user_fails() {
    let app = TestApp::spawn();
    let owner = app.signup("Ada", "ada@example.com").await;
    let member = app.signup("Bob", "bob@example.com").await;
    let workspace_id = app.create_workspace(&owner, "Acme").await;
    app.join_workspace(&member, &workspace_id).await;
    let uri = format!("/workspaces/{}/invite-member", workspace_id);

    let (status, body) = app
        .post(&uri, Some(&owner.token), json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User is already a member of this workspace");

    let (status, body) = app
        .post(
            &uri,
            Some(&owner.token),
            json!({ "email": "ghost@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}
