//! Purpose-bound signed tokens.
//!
//! Every token carries a `purpose` claim and is only accepted by the flow it
//! was minted for. Expiry is judged against the injected [`Clock`] rather than
//! the library's wall-clock check, so an expired token is reported as
//! [`ServiceError::TokenExpired`] and never as a generic decode failure.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{clock::Clock, error::ServiceError};
use crate::config::TokenConfig;
use crate::models::WorkspaceRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    #[serde(rename = "email-verification")]
    EmailVerification,
    #[serde(rename = "2fa-step-up")]
    TwoFactorStepUp,
    #[serde(rename = "password-reset")]
    PasswordReset,
    #[serde(rename = "session")]
    Session,
    #[serde(rename = "workspace-invite")]
    WorkspaceInvite,
}

/// Claims payload bound to exactly one purpose.
pub trait PurposeClaims: Serialize + DeserializeOwned {
    const PURPOSE: TokenPurpose;
}

/// Registration data held in the verification token until the email is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRegistration {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl PurposeClaims for PendingRegistration {
    const PURPOSE: TokenPurpose = TokenPurpose::EmailVerification;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepUpClaims {
    pub sub: String,
}

impl PurposeClaims for StepUpClaims {
    const PURPOSE: TokenPurpose = TokenPurpose::TwoFactorStepUp;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasswordResetClaims {
    pub sub: String,
}

impl PurposeClaims for PasswordResetClaims {
    const PURPOSE: TokenPurpose = TokenPurpose::PasswordReset;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
}

impl PurposeClaims for SessionClaims {
    const PURPOSE: TokenPurpose = TokenPurpose::Session;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviteClaims {
    pub sub: String,
    pub workspace_id: String,
    pub role: WorkspaceRole,
}

impl PurposeClaims for InviteClaims {
    const PURPOSE: TokenPurpose = TokenPurpose::WorkspaceInvite;
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, C> {
    purpose: TokenPurpose,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(flatten)]
    claims: &'a C,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    purpose: TokenPurpose,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken<C> {
    pub claims: C,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct SigningKeys {
    encoding: EncodingKey,
    /// Current key first, then rotated-out keys still accepted for verification.
    decoding: Vec<DecodingKey>,
}

#[derive(Clone)]
pub struct TokenService {
    keys: Arc<SigningKeys>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        let decoding = std::iter::once(&config.secret)
            .chain(config.previous_secrets.iter())
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()))
            .collect();

        Self {
            keys: Arc::new(SigningKeys {
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding,
            }),
            clock,
        }
    }

    pub fn issue<C: PurposeClaims>(
        &self,
        claims: &C,
        ttl: Duration,
    ) -> Result<IssuedToken, ServiceError> {
        let now = self.clock.now();
        let expires_at = now + ttl;

        let envelope = OutgoingEnvelope {
            purpose: C::PURPOSE,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            claims,
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &envelope,
            &self.keys.encoding,
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Checks signature, then expiry, then purpose, then payload shape.
    pub fn verify<C: PurposeClaims>(&self, token: &str) -> Result<VerifiedToken<C>, ServiceError> {
        let envelope = self.decode_envelope(token)?;

        let now = self.clock.now();
        if now.timestamp() >= envelope.exp {
            return Err(ServiceError::TokenExpired);
        }

        if envelope.purpose != C::PURPOSE {
            tracing::debug!(
                expected = ?C::PURPOSE,
                actual = ?envelope.purpose,
                "Token presented for the wrong purpose"
            );
            return Err(ServiceError::TokenPurposeMismatch);
        }

        let claims: C = serde_json::from_value(serde_json::Value::Object(envelope.rest))
            .map_err(|_| ServiceError::TokenInvalid)?;

        Ok(VerifiedToken {
            claims,
            issued_at: timestamp(envelope.iat)?,
            expires_at: timestamp(envelope.exp)?,
        })
    }

    fn decode_envelope(&self, token: &str) -> Result<IncomingEnvelope, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        for key in &self.keys.decoding {
            match jsonwebtoken::decode::<IncomingEnvelope>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(_) => return Err(ServiceError::TokenInvalid),
            }
        }

        Err(ServiceError::TokenInvalid)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, ServiceError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(ServiceError::TokenInvalid)
}
