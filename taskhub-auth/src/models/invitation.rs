//! Invitation ledger entry - a targeted, role-carrying workspace invite.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkspaceRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInvitation {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub workspace_id: String,
    pub role: WorkspaceRole,
    pub token_hash: String,
    pub invited_by: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl WorkspaceInvitation {
    pub fn new(
        user_id: String,
        workspace_id: String,
        role: WorkspaceRole,
        token_hash: String,
        invited_by: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            workspace_id,
            role,
            token_hash,
            invited_by,
            expires_at,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
