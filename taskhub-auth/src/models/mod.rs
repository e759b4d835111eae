pub mod activity;
pub mod invitation;
pub mod project;
pub mod user;
pub mod verification;
pub mod workspace;

pub use activity::{ActivityAction, ActivityEntry, ResourceType};
pub use invitation::WorkspaceInvitation;
pub use project::{Project, ProjectMember, ProjectRole};
pub use user::{normalize_email, OtpChallenge, PublicUser, User};
pub use verification::{VerificationEntry, VerificationPurpose};
pub use workspace::{Workspace, WorkspaceMember, WorkspaceRole};

/// Serde adapter storing `Option<DateTime<Utc>>` as a BSON date (or null).
pub(crate) mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
    }
}
