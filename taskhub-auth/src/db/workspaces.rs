use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::FindOptions,
};
use std::{collections::HashMap, sync::Mutex};

use super::{lock_poisoned, to_bson, MongoDb};
use crate::models::{Workspace, WorkspaceMember, WorkspaceRole};
use crate::services::error::ServiceError;

/// Field changes for a workspace; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Preconditions and effect of an ownership hand-over, applied atomically.
#[derive(Debug, Clone)]
pub struct OwnershipTransfer<'a> {
    pub workspace_id: &'a str,
    /// Owner at the time the caller read the workspace.
    pub previous_owner: &'a str,
    /// Must still hold ADMIN or OWNER when the write lands.
    pub caller: &'a str,
    /// Must still be a member when the write lands.
    pub new_owner: &'a str,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn insert(&self, workspace: &Workspace) -> Result<(), ServiceError>;

    async fn find_by_id(&self, workspace_id: &str) -> Result<Option<Workspace>, ServiceError>;

    /// Workspaces the user belongs to, newest first.
    async fn list_for_member(&self, user_id: &str) -> Result<Vec<Workspace>, ServiceError>;

    async fn update(
        &self,
        workspace_id: &str,
        changes: &WorkspaceChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    /// Returns `false` if the user was already a member (or the workspace is gone).
    async fn add_member_if_absent(
        &self,
        workspace_id: &str,
        user_id: &str,
        member: &WorkspaceMember,
    ) -> Result<bool, ServiceError>;

    /// Previous owner and caller drop to MEMBER, the new owner becomes OWNER.
    /// Returns `false` when any precondition no longer holds.
    async fn transfer_ownership(&self, transfer: &OwnershipTransfer<'_>)
        -> Result<bool, ServiceError>;

    async fn delete(&self, workspace_id: &str) -> Result<bool, ServiceError>;
}

fn member_path(user_id: &str) -> String {
    format!("members.{}", user_id)
}

#[async_trait]
impl WorkspaceStore for MongoDb {
    async fn insert(&self, workspace: &Workspace) -> Result<(), ServiceError> {
        self.workspaces().insert_one(workspace, None).await?;
        Ok(())
    }

    async fn find_by_id(&self, workspace_id: &str) -> Result<Option<Workspace>, ServiceError> {
        Ok(self
            .workspaces()
            .find_one(doc! { "_id": workspace_id }, None)
            .await?)
    }

    async fn list_for_member(&self, user_id: &str) -> Result<Vec<Workspace>, ServiceError> {
        let mut filter = Document::new();
        filter.insert(member_path(user_id), doc! { "$exists": true });
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self.workspaces().find(filter, options).await?;
        let mut workspaces = Vec::new();
        while cursor.advance().await? {
            workspaces.push(cursor.deserialize_current()?);
        }
        Ok(workspaces)
    }

    async fn update(
        &self,
        workspace_id: &str,
        changes: &WorkspaceChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut set = doc! { "updated_at": BsonDateTime::from_chrono(at) };
        if let Some(name) = &changes.name {
            set.insert("name", name.as_str());
        }
        if let Some(description) = &changes.description {
            set.insert("description", description.as_str());
        }
        if let Some(color) = &changes.color {
            set.insert("color", color.as_str());
        }

        let result = self
            .workspaces()
            .update_one(doc! { "_id": workspace_id }, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn add_member_if_absent(
        &self,
        workspace_id: &str,
        user_id: &str,
        member: &WorkspaceMember,
    ) -> Result<bool, ServiceError> {
        let path = member_path(user_id);

        let mut filter = doc! { "_id": workspace_id };
        filter.insert(path.clone(), doc! { "$exists": false });

        let mut set = Document::new();
        set.insert(path, to_bson(member)?);

        let result = self
            .workspaces()
            .update_one(filter, doc! { "$set": set }, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn transfer_ownership(
        &self,
        transfer: &OwnershipTransfer<'_>,
    ) -> Result<bool, ServiceError> {
        let mut filter = doc! {
            "_id": transfer.workspace_id,
            "owner_id": transfer.previous_owner,
        };
        filter.insert(
            format!("{}.role", member_path(transfer.caller)),
            doc! { "$in": [WorkspaceRole::Admin.as_str(), WorkspaceRole::Owner.as_str()] },
        );
        filter.insert(member_path(transfer.new_owner), doc! { "$exists": true });

        let mut set = doc! {
            "owner_id": transfer.new_owner,
            "updated_at": BsonDateTime::from_chrono(transfer.at),
        };
        set.insert(
            format!("{}.role", member_path(transfer.previous_owner)),
            WorkspaceRole::Member.as_str(),
        );
        set.insert(
            format!("{}.role", member_path(transfer.caller)),
            WorkspaceRole::Member.as_str(),
        );
        set.insert(
            format!("{}.role", member_path(transfer.new_owner)),
            WorkspaceRole::Owner.as_str(),
        );

        let result = self
            .workspaces()
            .update_one(filter, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete(&self, workspace_id: &str) -> Result<bool, ServiceError> {
        let result = self
            .workspaces()
            .delete_one(doc! { "_id": workspace_id }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}

#[derive(Default)]
pub struct InMemoryWorkspaceStore {
    workspaces: Mutex<HashMap<String, Workspace>>,
}

#[async_trait]
impl WorkspaceStore for InMemoryWorkspaceStore {
    async fn insert(&self, workspace: &Workspace) -> Result<(), ServiceError> {
        let mut workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        workspaces.insert(workspace.id.clone(), workspace.clone());
        Ok(())
    }

    async fn find_by_id(&self, workspace_id: &str) -> Result<Option<Workspace>, ServiceError> {
        let workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        Ok(workspaces.get(workspace_id).cloned())
    }

    async fn list_for_member(&self, user_id: &str) -> Result<Vec<Workspace>, ServiceError> {
        let workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        let mut found: Vec<Workspace> = workspaces
            .values()
            .filter(|w| w.is_member(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update(
        &self,
        workspace_id: &str,
        changes: &WorkspaceChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        let Some(workspace) = workspaces.get_mut(workspace_id) else {
            return Ok(false);
        };

        if let Some(name) = &changes.name {
            workspace.name = name.clone();
        }
        if let Some(description) = &changes.description {
            workspace.description = Some(description.clone());
        }
        if let Some(color) = &changes.color {
            workspace.color = color.clone();
        }
        workspace.updated_at = at;
        Ok(true)
    }

    async fn add_member_if_absent(
        &self,
        workspace_id: &str,
        user_id: &str,
        member: &WorkspaceMember,
    ) -> Result<bool, ServiceError> {
        let mut workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        match workspaces.get_mut(workspace_id) {
            Some(workspace) if !workspace.members.contains_key(user_id) => {
                workspace
                    .members
                    .insert(user_id.to_string(), member.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transfer_ownership(
        &self,
        transfer: &OwnershipTransfer<'_>,
    ) -> Result<bool, ServiceError> {
        let mut workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        let Some(workspace) = workspaces.get_mut(transfer.workspace_id) else {
            return Ok(false);
        };

        let caller_privileged = workspace
            .role_of(transfer.caller)
            .is_some_and(|role| role >= WorkspaceRole::Admin);
        if workspace.owner_id != transfer.previous_owner
            || !caller_privileged
            || !workspace.is_member(transfer.new_owner)
        {
            return Ok(false);
        }

        for demoted in [transfer.previous_owner, transfer.caller] {
            if let Some(member) = workspace.members.get_mut(demoted) {
                member.role = WorkspaceRole::Member;
            }
        }
        if let Some(member) = workspace.members.get_mut(transfer.new_owner) {
            member.role = WorkspaceRole::Owner;
        }
        workspace.owner_id = transfer.new_owner.to_string();
        workspace.updated_at = transfer.at;
        Ok(true)
    }

    async fn delete(&self, workspace_id: &str) -> Result<bool, ServiceError> {
        let mut workspaces = self.workspaces.lock().map_err(lock_poisoned)?;
        Ok(workspaces.remove(workspace_id).is_some())
    }
}
