use chrono::Duration;
use std::sync::Arc;

use super::{
    clock::Clock,
    error::ServiceError,
    tokens::{SessionClaims, TokenService},
};
use crate::db::CredentialStore;
use crate::models::{PublicUser, User};

#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub user: PublicUser,
}

/// Mints the bearer credential after full authentication and resolves it back
/// to an identity on every authenticated request.
#[derive(Clone)]
pub struct SessionIssuer {
    tokens: TokenService,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(
        tokens: TokenService,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            tokens,
            credentials,
            clock,
            ttl,
        }
    }

    /// Stamps the login (clearing any OTP) and issues a session token.
    pub async fn issue(&self, user: &User) -> Result<SessionGrant, ServiceError> {
        let now = self.clock.now();
        let issued = self.tokens.issue(
            &SessionClaims {
                sub: user.id.clone(),
            },
            self.ttl,
        )?;

        self.credentials.record_login(&user.id, now).await?;

        let mut public = PublicUser::from(user);
        public.last_login_at = Some(now);

        tracing::info!(user_id = %user.id, "Session issued");
        Ok(SessionGrant {
            token: issued.token,
            user: public,
        })
    }

    /// Only `session` tokens are accepted here.
    pub async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let verified = self.tokens.verify::<SessionClaims>(token)?;
        self.credentials
            .find_by_id(&verified.claims.sub)
            .await?
            .ok_or(ServiceError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::db::InMemoryCredentialStore;
    use crate::services::{clock::ManualClock, tokens::StepUpClaims};

    fn issuer() -> (SessionIssuer, TokenService, Arc<InMemoryCredentialStore>) {
        let clock = Arc::new(ManualClock::default());
        let tokens = TokenService::new(
            &TokenConfig {
                secret: "session-test-secret".to_string(),
                ..TokenConfig::default()
            },
            clock.clone(),
        );
        let store = Arc::new(InMemoryCredentialStore::default());
        let issuer = SessionIssuer::new(tokens.clone(), store.clone(), clock, Duration::days(7));
        (issuer, tokens, store)
    }

    #[tokio::test]
    async fn issued_session_authenticates_its_user() {
        let (issuer, _, store) = issuer();
        let user = User::verified(
            "Alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            chrono::Utc::now(),
        );
        store.insert_if_absent(&user).await.unwrap();

        let grant = issuer.issue(&user).await.unwrap();
        assert!(grant.user.last_login_at.is_some());

        let resolved = issuer.authenticate(&grant.token).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(resolved.last_login_at.is_some());
    }

    #[tokio::test]
    async fn step_up_token_is_not_a_session() {
        let (issuer, tokens, _) = issuer();
        let step_up = tokens
            .issue(&StepUpClaims { sub: "u1".to_string() }, Duration::minutes(5))
            .unwrap();

        assert!(matches!(
            issuer.authenticate(&step_up.token).await,
            Err(ServiceError::TokenPurposeMismatch)
        ));
    }
}
