use std::sync::Arc;

use super::{
    access::{AccessEvaluator, ProjectAction, WorkspaceAction},
    clock::Clock,
    error::ServiceError,
};
use crate::db::{projects::ProjectChanges, ActivityRecorder, ProjectStore, WorkspaceStore};
use crate::dtos::{
    project::{
        CreateProjectRequest, ProjectResponse, ProjectView, UpdateProjectRequest,
        WorkspaceProjectsResponse,
    },
    workspace::WorkspaceView,
    MessageResponse,
};
use crate::models::{ActivityAction, ActivityEntry, Project, ProjectMember, ResourceType};
use crate::utils::non_blank;

#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    activity: Arc<dyn ActivityRecorder>,
    clock: Arc<dyn Clock>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        workspaces: Arc<dyn WorkspaceStore>,
        activity: Arc<dyn ActivityRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            projects,
            workspaces,
            activity,
            clock,
        }
    }

    async fn load(&self, project_id: &str) -> Result<Project, ServiceError> {
        self.projects
            .find_by_id(project_id)
            .await?
            .ok_or(ServiceError::NotFound("Project"))
    }

    async fn record(&self, user_id: &str, action: ActivityAction, project_id: &str) {
        let entry = ActivityEntry::new(
            user_id,
            action,
            ResourceType::Project,
            project_id,
            None,
            self.clock.now(),
        );
        self.activity.record_best_effort(&entry).await;
    }

    fn respond(message: &str, project: &Project) -> ProjectResponse {
        ProjectResponse {
            success: true,
            message: message.to_string(),
            project: ProjectView::from(project),
        }
    }

    /// Every listed member must already belong to the workspace; the creator is always MANAGER.
    pub async fn create(
        &self,
        caller_id: &str,
        workspace_id: &str,
        req: CreateProjectRequest,
    ) -> Result<ProjectResponse, ServiceError> {
        let workspace = self
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::CreateProject)?;

        let title = non_blank(&req.title, "Title")?;
        let now = self.clock.now();
        let mut project = Project::new(
            workspace.id.clone(),
            title,
            req.description,
            caller_id.to_string(),
            now,
        );

        for input in req.members {
            if input.user_id == caller_id {
                continue;
            }
            if !workspace.is_member(&input.user_id) {
                return Err(ServiceError::Validation(format!(
                    "User {} is not a member of this workspace",
                    input.user_id
                )));
            }
            project.members.insert(
                input.user_id,
                ProjectMember {
                    role: input.role,
                    joined_at: now,
                },
            );
        }

        self.projects.insert(&project).await?;
        self.record(caller_id, ActivityAction::CreatedProject, &project.id)
            .await;

        tracing::info!(
            user_id = %caller_id,
            workspace_id = %workspace.id,
            project_id = %project.id,
            "Project created"
        );
        Ok(Self::respond("Project created successfully", &project))
    }

    /// Only projects that list the caller are returned; workspace rank grants nothing here.
    pub async fn list_for_workspace(
        &self,
        caller_id: &str,
        workspace_id: &str,
    ) -> Result<WorkspaceProjectsResponse, ServiceError> {
        let workspace = self
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::View)?;

        let projects = self
            .projects
            .list_for_member_in_workspace(workspace_id, caller_id)
            .await?;
        Ok(WorkspaceProjectsResponse {
            success: true,
            workspace: WorkspaceView::from(&workspace),
            projects: projects.iter().map(ProjectView::from).collect(),
        })
    }

    pub async fn get(
        &self,
        caller_id: &str,
        project_id: &str,
    ) -> Result<ProjectResponse, ServiceError> {
        let project = self.load(project_id).await?;
        AccessEvaluator::project(caller_id, &project, ProjectAction::View)?;
        Ok(Self::respond("Project fetched successfully", &project))
    }

    pub async fn update(
        &self,
        caller_id: &str,
        project_id: &str,
        req: UpdateProjectRequest,
    ) -> Result<ProjectResponse, ServiceError> {
        let project = self.load(project_id).await?;
        AccessEvaluator::project(caller_id, &project, ProjectAction::Update)?;

        let changes = ProjectChanges {
            title: req.title.as_deref().map(|t| non_blank(t, "Title")).transpose()?,
            description: req.description,
        };
        if changes.title.is_none() && changes.description.is_none() {
            return Ok(Self::respond("Nothing to update", &project));
        }

        if !self
            .projects
            .update(project_id, &changes, self.clock.now())
            .await?
        {
            return Err(ServiceError::NotFound("Project"));
        }
        self.record(caller_id, ActivityAction::UpdatedProject, project_id)
            .await;

        let updated = self.load(project_id).await?;
        Ok(Self::respond("Project updated successfully", &updated))
    }

    pub async fn delete(
        &self,
        caller_id: &str,
        project_id: &str,
    ) -> Result<MessageResponse, ServiceError> {
        let project = self.load(project_id).await?;
        AccessEvaluator::project(caller_id, &project, ProjectAction::Delete)?;

        self.projects.delete(project_id).await?;
        self.record(caller_id, ActivityAction::DeletedProject, project_id)
            .await;

        tracing::info!(user_id = %caller_id, project_id = %project_id, "Project deleted");
        Ok(MessageResponse::ok("Project deleted successfully"))
    }
}
