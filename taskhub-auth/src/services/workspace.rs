//! Workspace lifecycle, both invitation paths and ownership transfer.

use std::sync::Arc;

use super::{
    access::{AccessEvaluator, WorkspaceAction},
    clock::Clock,
    email::{EmailMessage, EmailProvider},
    error::ServiceError,
    metrics::record_auth_event,
    tokens::{InviteClaims, TokenService},
};
use crate::config::TokenConfig;
use crate::db::{
    workspaces::{OwnershipTransfer, WorkspaceChanges},
    ActivityRecorder, CredentialStore, InvitationLedger, ProjectStore, WorkspaceStore,
};
use crate::dtos::{
    workspace::{
        AcceptInviteTokenRequest, ChangeOwnershipRequest, CreateWorkspaceRequest,
        InviteMemberRequest, MembershipResponse, UpdateWorkspaceRequest, WorkspaceListResponse,
        WorkspaceResponse, WorkspaceView,
    },
    MessageResponse,
};
use crate::models::{
    normalize_email, ActivityAction, ActivityEntry, ResourceType, User, Workspace,
    WorkspaceInvitation, WorkspaceMember, WorkspaceRole,
};
use crate::utils::{constant_time_eq, hash_token, non_blank};

const DEFAULT_COLOR: &str = "#4f46e5";

/// `#rrggbb` only.
fn validate_color(color: &str) -> Result<(), ServiceError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(
            "Color must be a hex value like #4f46e5".to_string(),
        ))
    }
}

#[derive(Clone)]
pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceStore>,
    projects: Arc<dyn ProjectStore>,
    invitations: Arc<dyn InvitationLedger>,
    credentials: Arc<dyn CredentialStore>,
    activity: Arc<dyn ActivityRecorder>,
    tokens: TokenService,
    email: Arc<dyn EmailProvider>,
    clock: Arc<dyn Clock>,
    token_config: TokenConfig,
    frontend_url: String,
}

impl WorkspaceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspaces: Arc<dyn WorkspaceStore>,
        projects: Arc<dyn ProjectStore>,
        invitations: Arc<dyn InvitationLedger>,
        credentials: Arc<dyn CredentialStore>,
        activity: Arc<dyn ActivityRecorder>,
        tokens: TokenService,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
        token_config: TokenConfig,
        frontend_url: String,
    ) -> Self {
        Self {
            workspaces,
            projects,
            invitations,
            credentials,
            activity,
            tokens,
            email,
            clock,
            token_config,
            frontend_url,
        }
    }

    async fn load(&self, workspace_id: &str) -> Result<Workspace, ServiceError> {
        self.workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or(ServiceError::NotFound("Workspace"))
    }

    async fn record(
        &self,
        user_id: &str,
        action: ActivityAction,
        workspace_id: &str,
        details: Option<String>,
    ) {
        let entry = ActivityEntry::new(
            user_id,
            action,
            ResourceType::Workspace,
            workspace_id,
            details,
            self.clock.now(),
        );
        self.activity.record_best_effort(&entry).await;
    }

    fn respond(&self, message: &str, workspace: &Workspace) -> WorkspaceResponse {
        WorkspaceResponse {
            success: true,
            message: message.to_string(),
            workspace: WorkspaceView::from(workspace),
        }
    }

    pub async fn create(
        &self,
        caller_id: &str,
        req: CreateWorkspaceRequest,
    ) -> Result<WorkspaceResponse, ServiceError> {
        let color = match req.color {
            Some(color) => {
                validate_color(&color)?;
                color
            }
            None => DEFAULT_COLOR.to_string(),
        };

        let name = non_blank(&req.name, "Name")?;
        let workspace = Workspace::new(
            name,
            req.description,
            color,
            caller_id.to_string(),
            self.clock.now(),
        );
        self.workspaces.insert(&workspace).await?;

        self.record(caller_id, ActivityAction::CreatedWorkspace, &workspace.id, None)
            .await;

        tracing::info!(user_id = %caller_id, workspace_id = %workspace.id, "Workspace created");
        Ok(self.respond("Workspace created successfully", &workspace))
    }

    pub async fn get(
        &self,
        caller_id: &str,
        workspace_id: &str,
    ) -> Result<WorkspaceResponse, ServiceError> {
        let workspace = self.load(workspace_id).await?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::View)?;
        Ok(self.respond("Workspace fetched successfully", &workspace))
    }

    pub async fn list(&self, caller_id: &str) -> Result<WorkspaceListResponse, ServiceError> {
        let workspaces = self.workspaces.list_for_member(caller_id).await?;
        Ok(WorkspaceListResponse {
            success: true,
            workspaces: workspaces.iter().map(WorkspaceView::from).collect(),
        })
    }

    pub async fn update(
        &self,
        caller_id: &str,
        workspace_id: &str,
        req: UpdateWorkspaceRequest,
    ) -> Result<WorkspaceResponse, ServiceError> {
        let workspace = self.load(workspace_id).await?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::Update)?;

        if let Some(color) = &req.color {
            validate_color(color)?;
        }
        let name = req.name.as_deref().map(|n| non_blank(n, "Name")).transpose()?;

        let changes = WorkspaceChanges {
            name: name.filter(|n| *n != workspace.name),
            description: req
                .description
                .filter(|d| workspace.description.as_deref() != Some(d.as_str())),
            color: req.color.filter(|c| *c != workspace.color),
        };

        let changed: Vec<&str> = [
            changes.name.as_ref().map(|_| "name"),
            changes.description.as_ref().map(|_| "description"),
            changes.color.as_ref().map(|_| "color"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if changed.is_empty() {
            return Ok(self.respond("Nothing to update", &workspace));
        }

        if !self
            .workspaces
            .update(workspace_id, &changes, self.clock.now())
            .await?
        {
            return Err(ServiceError::NotFound("Workspace"));
        }

        for field in changed {
            self.record(
                caller_id,
                ActivityAction::UpdatedWorkspace,
                workspace_id,
                Some(format!("Updated {}", field)),
            )
            .await;
        }

        let updated = self.load(workspace_id).await?;
        Ok(self.respond("Workspace updated successfully", &updated))
    }

    /// Removes the workspace together with its projects and pending invitations.
    pub async fn delete(
        &self,
        caller_id: &str,
        workspace_id: &str,
    ) -> Result<MessageResponse, ServiceError> {
        let workspace = self.load(workspace_id).await?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::Delete)?;

        let projects = self.projects.delete_for_workspace(workspace_id).await?;
        let invites = self.invitations.remove_for_workspace(workspace_id).await?;
        self.workspaces.delete(workspace_id).await?;

        self.record(
            caller_id,
            ActivityAction::DeletedWorkspace,
            workspace_id,
            Some(workspace.name.clone()),
        )
        .await;

        tracing::info!(
            user_id = %caller_id,
            workspace_id = %workspace_id,
            projects,
            invites,
            "Workspace deleted"
        );
        Ok(MessageResponse::ok("Workspace deleted successfully"))
    }

    /// Path B, issuing side: a targeted, role-carrying invite.
    pub async fn invite_member(
        &self,
        caller: &User,
        workspace_id: &str,
        req: InviteMemberRequest,
    ) -> Result<MessageResponse, ServiceError> {
        let result = self.invite_member_inner(caller, workspace_id, req).await;
        match &result {
            Ok(_) => record_auth_event("workspace_invite", "success"),
            Err(e) => record_auth_event("workspace_invite", e.kind()),
        }
        result
    }

    async fn invite_member_inner(
        &self,
        caller: &User,
        workspace_id: &str,
        req: InviteMemberRequest,
    ) -> Result<MessageResponse, ServiceError> {
        let workspace = self.load(workspace_id).await?;
        AccessEvaluator::workspace(&caller.id, &workspace, WorkspaceAction::InviteMembers)?;

        let role = req.role.unwrap_or(WorkspaceRole::Member);
        if role == WorkspaceRole::Owner {
            return Err(ServiceError::Validation(
                "Invitations cannot grant OWNER; use change-ownership".to_string(),
            ));
        }

        let invitee = self
            .credentials
            .find_by_email(&normalize_email(&req.email))
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if workspace.is_member(&invitee.id) {
            return Err(ServiceError::AlreadyExists(
                "User is already a member of this workspace".to_string(),
            ));
        }

        let now = self.clock.now();
        let issued = self.tokens.issue(
            &InviteClaims {
                sub: invitee.id.clone(),
                workspace_id: workspace.id.clone(),
                role,
            },
            self.token_config.invite_ttl(),
        )?;

        let invitation = WorkspaceInvitation::new(
            invitee.id.clone(),
            workspace.id.clone(),
            role,
            hash_token(&issued.token),
            caller.id.clone(),
            issued.expires_at,
            now,
        );
        if !self.invitations.insert_if_vacant(&invitation, now).await? {
            return Err(ServiceError::AlreadyExists(
                "User has already been invited to this workspace".to_string(),
            ));
        }

        let message = EmailMessage::WorkspaceInvite {
            name: invitee.name.clone(),
            workspace: workspace.name.clone(),
            link: format!(
                "{}/workspace-invite/{}?tk={}",
                self.frontend_url, workspace.id, issued.token
            ),
        };
        self.email.send_best_effort(&invitee.email, &message).await;

        tracing::info!(
            user_id = %caller.id,
            workspace_id = %workspace.id,
            invitee_id = %invitee.id,
            role = %role,
            "Workspace invitation issued"
        );
        Ok(MessageResponse::ok("Invitation sent successfully"))
    }

    /// Path A: anyone holding the workspace id and a session joins as MEMBER.
    pub async fn accept_generated_invite(
        &self,
        caller_id: &str,
        workspace_id: &str,
    ) -> Result<MembershipResponse, ServiceError> {
        let workspace = self.load(workspace_id).await?;
        if workspace.is_member(caller_id) {
            return Err(ServiceError::AlreadyMember);
        }

        let member = WorkspaceMember::new(WorkspaceRole::Member, self.clock.now());
        if !self
            .workspaces
            .add_member_if_absent(workspace_id, caller_id, &member)
            .await?
        {
            return Err(ServiceError::AlreadyMember);
        }

        self.record(caller_id, ActivityAction::JoinedWorkspace, workspace_id, None)
            .await;

        tracing::info!(user_id = %caller_id, workspace_id = %workspace_id, "Joined workspace via link");
        Ok(MembershipResponse {
            success: true,
            message: "Successfully joined the workspace".to_string(),
            workspace_id: workspace_id.to_string(),
            role: WorkspaceRole::Member,
        })
    }

    /// Path B, redeeming side: the token must name the caller and match a live ledger entry.
    pub async fn accept_invite_by_token(
        &self,
        caller_id: &str,
        req: AcceptInviteTokenRequest,
    ) -> Result<MembershipResponse, ServiceError> {
        let result = self.accept_invite_by_token_inner(caller_id, req).await;
        match &result {
            Ok(_) => record_auth_event("workspace_invite_accept", "success"),
            Err(e) => record_auth_event("workspace_invite_accept", e.kind()),
        }
        result
    }

    async fn accept_invite_by_token_inner(
        &self,
        caller_id: &str,
        req: AcceptInviteTokenRequest,
    ) -> Result<MembershipResponse, ServiceError> {
        let claims = self.tokens.verify::<InviteClaims>(&req.token)?.claims;

        if claims.sub != caller_id {
            tracing::warn!(
                user_id = %caller_id,
                workspace_id = %claims.workspace_id,
                "Invite token presented by someone other than the invitee"
            );
            return Err(ServiceError::NotInvited);
        }

        let workspace = self.load(&claims.workspace_id).await?;
        if workspace.is_member(caller_id) {
            return Err(ServiceError::AlreadyMember);
        }

        let token_hash = hash_token(&req.token);
        let invitation = self
            .invitations
            .find(caller_id, &workspace.id)
            .await?
            .filter(|invite| constant_time_eq(&invite.token_hash, &token_hash))
            .ok_or(ServiceError::NotFound("Invitation"))?;
        if invitation.is_expired(self.clock.now()) {
            return Err(ServiceError::TokenExpired);
        }

        let member = WorkspaceMember::new(claims.role, self.clock.now());
        if !self
            .workspaces
            .add_member_if_absent(&workspace.id, caller_id, &member)
            .await?
        {
            return Err(ServiceError::AlreadyMember);
        }

        self.invitations
            .remove(caller_id, &workspace.id, &token_hash)
            .await?;

        self.record(
            caller_id,
            ActivityAction::JoinedWorkspace,
            &workspace.id,
            Some(format!("Accepted invitation as {}", claims.role)),
        )
        .await;

        tracing::info!(
            user_id = %caller_id,
            workspace_id = %workspace.id,
            role = %claims.role,
            "Workspace invitation accepted"
        );
        Ok(MembershipResponse {
            success: true,
            message: "Successfully joined the workspace".to_string(),
            workspace_id: workspace.id,
            role: claims.role,
        })
    }

    /// The previous owner (and an ADMIN caller) drop to MEMBER; the target becomes OWNER.
    pub async fn change_ownership(
        &self,
        caller_id: &str,
        workspace_id: &str,
        req: ChangeOwnershipRequest,
    ) -> Result<WorkspaceResponse, ServiceError> {
        if req.role != WorkspaceRole::Owner {
            return Err(ServiceError::Validation(
                "Role must be OWNER to transfer ownership".to_string(),
            ));
        }

        let workspace = self.load(workspace_id).await?;
        AccessEvaluator::workspace(caller_id, &workspace, WorkspaceAction::TransferOwnership)?;

        if req.user_id == workspace.owner_id {
            return Err(ServiceError::AlreadyExists(
                "User is already the owner of this workspace".to_string(),
            ));
        }
        if req.user_id == caller_id {
            return Err(ServiceError::AlreadyExists(
                "You cannot transfer ownership to yourself".to_string(),
            ));
        }
        if !workspace.is_member(&req.user_id) {
            return Err(ServiceError::NotFound("Workspace member"));
        }

        let transfer = OwnershipTransfer {
            workspace_id,
            previous_owner: &workspace.owner_id,
            caller: caller_id,
            new_owner: &req.user_id,
            at: self.clock.now(),
        };
        if !self.workspaces.transfer_ownership(&transfer).await? {
            tracing::warn!(
                user_id = %caller_id,
                workspace_id = %workspace_id,
                "Ownership transfer lost a concurrent update"
            );
            return Err(ServiceError::InsufficientRole(
                "Workspace membership changed during the transfer; reload and retry".to_string(),
            ));
        }

        self.record(
            caller_id,
            ActivityAction::TransferredWorkspaceOwnership,
            workspace_id,
            Some(format!("Transferred ownership to {}", req.user_id)),
        )
        .await;

        tracing::info!(
            user_id = %caller_id,
            workspace_id = %workspace_id,
            new_owner_id = %req.user_id,
            "Workspace ownership transferred"
        );

        let updated = self.load(workspace_id).await?;
        Ok(self.respond("Ownership transferred successfully", &updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_six_digit_hex_colors() {
        assert!(validate_color("#4f46E5").is_ok());
        assert!(validate_color("4f46e5").is_err());
        assert!(validate_color("#4f46e").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }
}
