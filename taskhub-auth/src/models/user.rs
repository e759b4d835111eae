use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lowercased, trimmed form used as the identity key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// One-time code issued during 2FA login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtpChallenge {
    pub code: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub otp: Option<OtpChallenge>,
    #[serde(default, with = "super::optional_bson_datetime")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a verified identity from a redeemed registration claim.
    pub fn verified(name: String, email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email: normalize_email(&email),
            password_hash,
            email_verified: true,
            two_factor_enabled: false,
            otp: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User as exposed over the API: no password hash, no OTP.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    #[serde(rename = "twoFAEnabled")]
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            two_factor_enabled: user.two_factor_enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn public_user_omits_secrets() {
        let mut user = User::verified(
            "Alice".to_string(),
            "alice@example.com".to_string(),
            "$argon2id$hash".to_string(),
            Utc::now(),
        );
        user.otp = Some(OtpChallenge {
            code: "123456".to_string(),
            expires_at: Utc::now(),
        });

        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        let rendered = json.to_string();
        assert!(!rendered.contains("argon2"));
        assert!(!rendered.contains("123456"));
        assert_eq!(json["twoFAEnabled"], false);
    }
}
