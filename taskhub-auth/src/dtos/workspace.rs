use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Workspace, WorkspaceRole};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Acme Engineering")]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[schema(example = "#4f46e5")]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateWorkspaceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "bob@example.com")]
    pub email: String,

    /// Defaults to MEMBER.
    pub role: Option<WorkspaceRole>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcceptInviteTokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOwnershipRequest {
    #[validate(length(min = 1, message = "User id is required"))]
    pub user_id: String,

    #[schema(example = "OWNER")]
    pub role: WorkspaceRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMemberView {
    pub user_id: String,
    pub role: WorkspaceRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub owner_id: String,
    pub members: Vec<WorkspaceMemberView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Workspace> for WorkspaceView {
    fn from(workspace: &Workspace) -> Self {
        Self {
            id: workspace.id.clone(),
            name: workspace.name.clone(),
            description: workspace.description.clone(),
            color: workspace.color.clone(),
            owner_id: workspace.owner_id.clone(),
            members: workspace
                .members
                .iter()
                .map(|(user_id, member)| WorkspaceMemberView {
                    user_id: user_id.clone(),
                    role: member.role,
                    joined_at: member.joined_at,
                })
                .collect(),
            created_at: workspace.created_at,
            updated_at: workspace.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceResponse {
    pub success: bool,
    pub message: String,
    pub workspace: WorkspaceView,
}

/// Workspaces the caller belongs to, newest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceListResponse {
    pub success: bool,
    pub workspaces: Vec<WorkspaceView>,
}

/// Result of joining a workspace through either invitation path.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub success: bool,
    pub message: String,
    pub workspace_id: String,
    pub role: WorkspaceRole,
}
