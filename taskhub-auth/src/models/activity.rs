use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    CreatedWorkspace,
    UpdatedWorkspace,
    DeletedWorkspace,
    JoinedWorkspace,
    TransferredWorkspaceOwnership,
    CreatedProject,
    UpdatedProject,
    DeletedProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    Workspace,
    Project,
}

/// Append-only audit record of a membership or resource change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub details: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        user_id: &str,
        action: ActivityAction,
        resource_type: ResourceType,
        resource_id: &str,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            action,
            resource_type,
            resource_id: resource_id.to_string(),
            details,
            created_at: now,
        }
    }
}
