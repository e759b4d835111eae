use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        project::{
            CreateProjectRequest, ProjectResponse, UpdateProjectRequest, WorkspaceProjectsResponse,
        },
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentUser,
    utils::ValidatedJson,
    AppState,
};

/// List the workspace's projects that the caller is on
#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/projects",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Workspace and visible projects", body = WorkspaceProjectsResponse),
        (status = 403, description = "Not a workspace member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn list_workspace_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .project_service
        .list_for_workspace(&user.id, &workspace_id)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Create a project inside a workspace; the caller becomes its MANAGER
#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/projects",
    params(("workspace_id" = String, Path, description = "Workspace id")),
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "A listed member is not in the workspace", body = ErrorResponse),
        (status = 403, description = "Not a workspace member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(workspace_id): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .project_service
        .create(&user.id, &workspace_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Read a project (project members only)
#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 403, description = "Not a project member", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.project_service.get(&user.id, &project_id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Update title or description (any project member)
#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectResponse),
        (status = 403, description = "Not a project member", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .project_service
        .update(&user.id, &project_id, req)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Delete a project (MANAGER only)
#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 403, description = "Not a member or not a manager", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "Project",
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.project_service.delete(&user.id, &project_id).await?;
    Ok((StatusCode::OK, Json(res)))
}
