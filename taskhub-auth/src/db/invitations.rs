use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use std::{collections::HashMap, sync::Mutex};

use super::{is_duplicate_key, lock_poisoned, MongoDb};
use crate::models::WorkspaceInvitation;
use crate::services::error::ServiceError;

/// Targeted workspace invitations: at most one live entry per (user, workspace).
#[async_trait]
pub trait InvitationLedger: Send + Sync {
    /// Stores `invite` unless a live one exists for the same (user, workspace).
    /// An expired one is discarded first. Returns `false` when a live invite blocks the insert.
    async fn insert_if_vacant(
        &self,
        invite: &WorkspaceInvitation,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn find(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceInvitation>, ServiceError>;

    /// Deletes the entry only if it still carries `token_hash`.
    async fn remove(
        &self,
        user_id: &str,
        workspace_id: &str,
        token_hash: &str,
    ) -> Result<bool, ServiceError>;

    async fn remove_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError>;
}

#[async_trait]
impl InvitationLedger for MongoDb {
    async fn insert_if_vacant(
        &self,
        invite: &WorkspaceInvitation,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        self.invitations()
            .delete_one(
                doc! {
                    "user_id": invite.user_id.as_str(),
                    "workspace_id": invite.workspace_id.as_str(),
                    "expires_at": { "$lte": BsonDateTime::from_chrono(now) },
                },
                None,
            )
            .await?;

        match self.invitations().insert_one(invite, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceInvitation>, ServiceError> {
        Ok(self
            .invitations()
            .find_one(doc! { "user_id": user_id, "workspace_id": workspace_id }, None)
            .await?)
    }

    async fn remove(
        &self,
        user_id: &str,
        workspace_id: &str,
        token_hash: &str,
    ) -> Result<bool, ServiceError> {
        let result = self
            .invitations()
            .delete_one(
                doc! {
                    "user_id": user_id,
                    "workspace_id": workspace_id,
                    "token_hash": token_hash,
                },
                None,
            )
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn remove_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError> {
        let result = self
            .invitations()
            .delete_many(doc! { "workspace_id": workspace_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[derive(Default)]
pub struct InMemoryInvitationLedger {
    invites: Mutex<HashMap<(String, String), WorkspaceInvitation>>,
}

#[async_trait]
impl InvitationLedger for InMemoryInvitationLedger {
    async fn insert_if_vacant(
        &self,
        invite: &WorkspaceInvitation,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut invites = self.invites.lock().map_err(lock_poisoned)?;
        let key = (invite.user_id.clone(), invite.workspace_id.clone());

        if invites.get(&key).is_some_and(|existing| !existing.is_expired(now)) {
            return Ok(false);
        }
        invites.insert(key, invite.clone());
        Ok(true)
    }

    async fn find(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceInvitation>, ServiceError> {
        let invites = self.invites.lock().map_err(lock_poisoned)?;
        Ok(invites
            .get(&(user_id.to_string(), workspace_id.to_string()))
            .cloned())
    }

    async fn remove(
        &self,
        user_id: &str,
        workspace_id: &str,
        token_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut invites = self.invites.lock().map_err(lock_poisoned)?;
        let key = (user_id.to_string(), workspace_id.to_string());

        let matches = invites
            .get(&key)
            .is_some_and(|invite| invite.token_hash == token_hash);
        if matches {
            invites.remove(&key);
        }
        Ok(matches)
    }

    async fn remove_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError> {
        let mut invites = self.invites.lock().map_err(lock_poisoned)?;
        let before = invites.len();
        invites.retain(|(_, ws), _| ws != workspace_id);
        Ok((before - invites.len()) as u64)
    }
}
