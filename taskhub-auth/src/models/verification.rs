use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    PasswordReset,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::PasswordReset => "password_reset",
        }
    }
}

/// Outstanding single-use token for a user. At most one per (user, purpose).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub purpose: VerificationPurpose,
    /// SHA-256 of the issued token; the raw token only travels by email.
    pub token_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VerificationEntry {
    pub fn new(
        user_id: String,
        purpose: VerificationPurpose,
        token_hash: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            purpose,
            token_hash,
            expires_at,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
