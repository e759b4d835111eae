use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Workspace roles in ascending order of privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkspaceRole {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Viewer => "VIEWER",
            WorkspaceRole::Member => "MEMBER",
            WorkspaceRole::Admin => "ADMIN",
            WorkspaceRole::Owner => "OWNER",
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VIEWER" => Ok(WorkspaceRole::Viewer),
            "MEMBER" => Ok(WorkspaceRole::Member),
            "ADMIN" => Ok(WorkspaceRole::Admin),
            "OWNER" => Ok(WorkspaceRole::Owner),
            _ => Err(format!("Invalid workspace role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceMember {
    pub role: WorkspaceRole,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

impl WorkspaceMember {
    pub fn new(role: WorkspaceRole, joined_at: DateTime<Utc>) -> Self {
        Self { role, joined_at }
    }
}

/// Workspace document. Members are keyed by user id, so a user can appear at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub owner_id: String,
    pub members: BTreeMap<String, WorkspaceMember>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// New workspace with the creator as its only member and owner.
    pub fn new(
        name: String,
        description: Option<String>,
        color: String,
        owner_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut members = BTreeMap::new();
        members.insert(
            owner_id.clone(),
            WorkspaceMember::new(WorkspaceRole::Owner, now),
        );

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            color,
            owner_id,
            members,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role_of(&self, user_id: &str) -> Option<WorkspaceRole> {
        self.members.get(user_id).map(|m| m.role)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(WorkspaceRole::Viewer < WorkspaceRole::Member);
        assert!(WorkspaceRole::Member < WorkspaceRole::Admin);
        assert!(WorkspaceRole::Admin < WorkspaceRole::Owner);
    }

    #[test]
    fn creator_is_sole_owner() {
        let ws = Workspace::new(
            "Acme".to_string(),
            None,
            "#ffffff".to_string(),
            "u1".to_string(),
            Utc::now(),
        );
        assert_eq!(ws.role_of("u1"), Some(WorkspaceRole::Owner));
        assert_eq!(ws.members.len(), 1);
        assert!(!ws.is_member("u2"));
    }

    #[test]
    fn role_round_trips_through_wire_name() {
        assert_eq!("admin".parse::<WorkspaceRole>(), Ok(WorkspaceRole::Admin));
        assert_eq!(
            serde_json::to_value(WorkspaceRole::Owner).unwrap(),
            serde_json::json!("OWNER")
        );
    }
}
