use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::workspace::WorkspaceView;
use crate::models::{Project, ProjectRole};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemberInput {
    pub user_id: String,
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[schema(example = "Q3 launch")]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub members: Vec<ProjectMemberInput>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemberView {
    pub user_id: String,
    pub role: ProjectRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub members: Vec<ProjectMemberView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectView {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            workspace_id: project.workspace_id.clone(),
            title: project.title.clone(),
            description: project.description.clone(),
            created_by: project.created_by.clone(),
            members: project
                .members
                .iter()
                .map(|(user_id, member)| ProjectMemberView {
                    user_id: user_id.clone(),
                    role: member.role,
                })
                .collect(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub success: bool,
    pub message: String,
    pub project: ProjectView,
}

/// A workspace with the projects whose roster includes the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceProjectsResponse {
    pub success: bool,
    pub workspace: WorkspaceView,
    pub projects: Vec<ProjectView>,
}
