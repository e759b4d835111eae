//! Role-capability checks for workspaces and projects.
//!
//! The two scopes are independent: a workspace role never grants anything on a
//! project and vice versa.

use super::error::ServiceError;
use crate::models::{Project, ProjectRole, Workspace, WorkspaceRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    View,
    CreateProject,
    InviteMembers,
    Update,
    TransferOwnership,
    Delete,
}

impl WorkspaceAction {
    pub fn required_role(&self) -> WorkspaceRole {
        match self {
            WorkspaceAction::View | WorkspaceAction::CreateProject => WorkspaceRole::Viewer,
            WorkspaceAction::InviteMembers
            | WorkspaceAction::Update
            | WorkspaceAction::TransferOwnership
            | WorkspaceAction::Delete => WorkspaceRole::Admin,
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            WorkspaceAction::View | WorkspaceAction::CreateProject => {
                "You do not have access to this workspace"
            }
            WorkspaceAction::InviteMembers => {
                "Only workspace owners and admins can invite members"
            }
            WorkspaceAction::Update => "Only workspace owners and admins can update the workspace",
            WorkspaceAction::TransferOwnership => {
                "Only workspace owners and admins can transfer ownership"
            }
            WorkspaceAction::Delete => "Only workspace owners and admins can delete the workspace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    View,
    Update,
    Delete,
    /// Create, edit or reassign a task inside the project.
    MutateTask,
    DeleteTask,
}

impl ProjectAction {
    pub fn required_role(&self) -> ProjectRole {
        match self {
            ProjectAction::View | ProjectAction::Update | ProjectAction::MutateTask => {
                ProjectRole::Viewer
            }
            ProjectAction::Delete | ProjectAction::DeleteTask => ProjectRole::Manager,
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            ProjectAction::View | ProjectAction::Update | ProjectAction::MutateTask => {
                "You do not have access to this project"
            }
            ProjectAction::Delete => "Only project managers can delete the project",
            ProjectAction::DeleteTask => "Only project managers can delete tasks",
        }
    }
}

/// Pure authorization: no I/O, the caller supplies the loaded resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessEvaluator;

impl AccessEvaluator {
    /// Returns the caller's role when it is sufficient for `action`.
    pub fn workspace(
        caller_id: &str,
        workspace: &Workspace,
        action: WorkspaceAction,
    ) -> Result<WorkspaceRole, ServiceError> {
        let role = workspace
            .role_of(caller_id)
            .ok_or(ServiceError::NotAMember("workspace"))?;

        if role < action.required_role() {
            tracing::warn!(
                user_id = %caller_id,
                workspace_id = %workspace.id,
                role = %role,
                action = ?action,
                "Workspace action denied"
            );
            return Err(ServiceError::InsufficientRole(action.denial().to_string()));
        }
        Ok(role)
    }

    pub fn project(
        caller_id: &str,
        project: &Project,
        action: ProjectAction,
    ) -> Result<ProjectRole, ServiceError> {
        let role = project
            .role_of(caller_id)
            .ok_or(ServiceError::NotAMember("project"))?;

        if role < action.required_role() {
            tracing::warn!(
                user_id = %caller_id,
                project_id = %project.id,
                action = ?action,
                "Project action denied"
            );
            return Err(ServiceError::InsufficientRole(action.denial().to_string()));
        }
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProjectMember, WorkspaceMember};
    use chrono::Utc;

    fn workspace_with(user: &str, role: WorkspaceRole) -> Workspace {
        let mut ws = Workspace::new(
            "Acme".to_string(),
            None,
            "#000000".to_string(),
            "owner".to_string(),
            Utc::now(),
        );
        ws.members
            .insert(user.to_string(), WorkspaceMember::new(role, Utc::now()));
        ws
    }

    fn project_with(user: &str, role: ProjectRole) -> Project {
        let mut project = Project::new(
            "w1".to_string(),
            "Launch".to_string(),
            None,
            "manager".to_string(),
            Utc::now(),
        );
        project.members.insert(
            user.to_string(),
            ProjectMember {
                role,
                joined_at: Utc::now(),
            },
        );
        project
    }

    #[test]
    fn member_cannot_invite_but_admin_can() {
        let ws = workspace_with("u1", WorkspaceRole::Member);
        assert!(matches!(
            AccessEvaluator::workspace("u1", &ws, WorkspaceAction::InviteMembers),
            Err(ServiceError::InsufficientRole(_))
        ));
        assert_eq!(
            AccessEvaluator::workspace("u1", &ws, WorkspaceAction::View).unwrap(),
            WorkspaceRole::Member
        );

        let ws = workspace_with("u2", WorkspaceRole::Admin);
        assert!(AccessEvaluator::workspace("u2", &ws, WorkspaceAction::InviteMembers).is_ok());
        assert!(AccessEvaluator::workspace("owner", &ws, WorkspaceAction::Delete).is_ok());
    }

    #[test]
    fn absence_is_not_a_member() {
        let ws = workspace_with("u1", WorkspaceRole::Viewer);
        assert!(matches!(
            AccessEvaluator::workspace("stranger", &ws, WorkspaceAction::View),
            Err(ServiceError::NotAMember("workspace"))
        ));
    }

    #[test]
    fn project_viewer_may_read_but_not_delete() {
        let project = project_with("u1", ProjectRole::Viewer);
        assert!(AccessEvaluator::project("u1", &project, ProjectAction::View).is_ok());
        assert!(matches!(
            AccessEvaluator::project("u1", &project, ProjectAction::Delete),
            Err(ServiceError::InsufficientRole(_))
        ));
        assert!(AccessEvaluator::project("manager", &project, ProjectAction::Delete).is_ok());
    }

    #[test]
    fn only_managers_delete_tasks() {
        let project = project_with("u1", ProjectRole::Viewer);
        assert!(AccessEvaluator::project("u1", &project, ProjectAction::MutateTask).is_ok());
        match AccessEvaluator::project("u1", &project, ProjectAction::DeleteTask) {
            Err(ServiceError::InsufficientRole(msg)) => {
                assert_eq!(msg, "Only project managers can delete tasks")
            }
            other => panic!("expected InsufficientRole, got {:?}", other),
        }

        let project = project_with("u2", ProjectRole::Contributor);
        assert!(matches!(
            AccessEvaluator::project("u2", &project, ProjectAction::DeleteTask),
            Err(ServiceError::InsufficientRole(_))
        ));
        assert_eq!(
            AccessEvaluator::project("manager", &project, ProjectAction::DeleteTask).unwrap(),
            ProjectRole::Manager
        );
    }

    #[test]
    fn workspace_owner_off_the_roster_cannot_touch_tasks() {
        let ws = workspace_with("u1", WorkspaceRole::Member);
        assert_eq!(
            AccessEvaluator::workspace("owner", &ws, WorkspaceAction::Delete).unwrap(),
            WorkspaceRole::Owner
        );

        let project = project_with("u1", ProjectRole::Contributor);
        assert!(matches!(
            AccessEvaluator::project("owner", &project, ProjectAction::MutateTask),
            Err(ServiceError::NotAMember("project"))
        ));
    }

    #[test]
    fn workspace_owner_has_no_implicit_project_role() {
        let project = project_with("u1", ProjectRole::Contributor);
        assert!(matches!(
            AccessEvaluator::project("owner", &project, ProjectAction::Update),
            Err(ServiceError::NotAMember("project"))
        ));
    }
}
