use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Project roles in ascending order of privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectRole {
    Viewer,
    Contributor,
    Manager,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMember {
    pub role: ProjectRole,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub members: BTreeMap<String, ProjectMember>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New project whose creator manages it.
    pub fn new(
        workspace_id: String,
        title: String,
        description: Option<String>,
        created_by: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut members = BTreeMap::new();
        members.insert(
            created_by.clone(),
            ProjectMember {
                role: ProjectRole::Manager,
                joined_at: now,
            },
        );

        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id,
            title,
            description,
            created_by,
            members,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role_of(&self, user_id: &str) -> Option<ProjectRole> {
        self.members.get(user_id).map(|m| m.role)
    }
}
