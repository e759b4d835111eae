use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        workspace::{
            AcceptInviteTokenRequest, ChangeOwnershipRequest, CreateWorkspaceRequest,
            InviteMemberRequest, MembershipResponse, UpdateWorkspaceRequest, WorkspaceListResponse,
            WorkspaceResponse,
        },
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentUser,
    utils::ValidatedJson,
    AppState,
};

/// Create a workspace owned by the caller
#[utoipa::path(
    post,
    path = "/workspaces",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 201, description = "Workspace created", body = WorkspaceResponse),
        (status = 400, description = "Invalid color", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn create_workspace(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.workspace_service.create(&user.id, req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// List the workspaces the caller belongs to
#[utoipa::path(
    get,
    path = "/workspaces",
    responses(
        (status = 200, description = "Caller's workspaces, newest first", body = WorkspaceListResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn list_workspaces(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let res = state.workspace_service.list(&user.id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Read a workspace (members only)
#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Workspace", body = WorkspaceResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn get_workspace(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.workspace_service.get(&user.id, &workspace_id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Update name, description or color (ADMIN or OWNER)
#[utoipa::path(
    put,
    path = "/workspaces/{workspace_id}",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    request_body = UpdateWorkspaceRequest,
    responses(
        (status = 200, description = "Workspace updated", body = WorkspaceResponse),
        (status = 403, description = "Not a member or insufficient role", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn update_workspace(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .update(&user.id, &workspace_id, req)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Delete a workspace with its projects and pending invitations (ADMIN or OWNER)
#[utoipa::path(
    delete,
    path = "/workspaces/{workspace_id}",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Workspace deleted", body = MessageResponse),
        (status = 403, description = "Not a member or insufficient role", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn delete_workspace(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .delete(&user.id, &workspace_id)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Invite an existing user by email (ADMIN or OWNER)
#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/invite-member",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    request_body = InviteMemberRequest,
    responses(
        (status = 200, description = "Invitation sent", body = MessageResponse),
        (status = 403, description = "Not a member or insufficient role", body = ErrorResponse),
        (status = 404, description = "Workspace or user not found", body = ErrorResponse),
        (status = 409, description = "Already a member or already invited", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn invite_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
    ValidatedJson(req): ValidatedJson<InviteMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .invite_member(&user, &workspace_id, req)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Join through a shared workspace link as MEMBER
#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/accept-generate-invite",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Joined", body = MembershipResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn accept_generated_invite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .accept_generated_invite(&user.id, &workspace_id)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Redeem a targeted invitation token
#[utoipa::path(
    post,
    path = "/workspaces/accept-invite-token",
    request_body = AcceptInviteTokenRequest,
    responses(
        (status = 200, description = "Joined with the invited role", body = MembershipResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Token names another user", body = ErrorResponse),
        (status = 404, description = "Invitation no longer exists", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn accept_invite_by_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<AcceptInviteTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .accept_invite_by_token(&user.id, req)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Hand ownership to another member (ADMIN or OWNER)
#[utoipa::path(
    put,
    path = "/workspaces/{workspace_id}/change-ownership",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    request_body = ChangeOwnershipRequest,
    responses(
        (status = 200, description = "Ownership transferred", body = WorkspaceResponse),
        (status = 400, description = "Role is not OWNER", body = ErrorResponse),
        (status = 403, description = "Not a member or insufficient role", body = ErrorResponse),
        (status = 404, description = "Workspace or target member not found", body = ErrorResponse),
        (status = 409, description = "Target already owns the workspace", body = ErrorResponse)
    ),
    tag = "Workspace",
    security(("bearer_auth" = []))
)]
pub async fn change_ownership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
    ValidatedJson(req): ValidatedJson<ChangeOwnershipRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .workspace_service
        .change_ownership(&user.id, &workspace_id, req)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}
