//! Registration, login with optional OTP step-up, and password reset.

use std::sync::Arc;

use super::{
    clock::Clock,
    email::{EmailMessage, EmailProvider},
    error::ServiceError,
    metrics::record_auth_event,
    session::SessionIssuer,
    tokens::{PasswordResetClaims, PendingRegistration, StepUpClaims, TokenService},
};
use crate::config::TokenConfig;
use crate::db::{CredentialStore, VerificationLedger};
use crate::dtos::{
    auth::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
        ResetPasswordRequest, SessionResponse, StepUpResponse, VerifyEmailRequest,
        VerifyTwoFactorRequest,
    },
    MessageResponse,
};
use crate::models::{normalize_email, OtpChallenge, User, VerificationEntry, VerificationPurpose};
use crate::utils::{
    constant_time_eq, generate_otp, hash_password, hash_token, non_blank, verify_password,
    Password,
};

/// Records the flow outcome as a metric and passes the result through.
fn tally<T>(
    event: &'static str,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match &result {
        Ok(_) => record_auth_event(event, "success"),
        Err(e) => record_auth_event(event, e.kind()),
    }
    result
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    verifications: Arc<dyn VerificationLedger>,
    tokens: TokenService,
    sessions: SessionIssuer,
    email: Arc<dyn EmailProvider>,
    clock: Arc<dyn Clock>,
    token_config: TokenConfig,
    frontend_url: String,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        verifications: Arc<dyn VerificationLedger>,
        tokens: TokenService,
        sessions: SessionIssuer,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
        token_config: TokenConfig,
        frontend_url: String,
    ) -> Self {
        Self {
            credentials,
            verifications,
            tokens,
            sessions,
            email,
            clock,
            token_config,
            frontend_url,
        }
    }

    /// No identity is stored here: the pending account travels inside the token.
    pub async fn register(&self, req: RegisterRequest) -> Result<MessageResponse, ServiceError> {
        tally("register", self.register_inner(req).await)
    }

    async fn register_inner(&self, req: RegisterRequest) -> Result<MessageResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let name = non_blank(&req.name, "Name")?;

        if self.credentials.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::AlreadyExists("User already exists".to_string()));
        }

        let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let pending = PendingRegistration {
            name,
            email: email.clone(),
            password_hash,
        };
        let issued = self
            .tokens
            .issue(&pending, self.token_config.email_verification_ttl())?;

        let message = EmailMessage::VerifyEmail {
            name: pending.name.clone(),
            link: format!("{}/auth/verify-email?token={}", self.frontend_url, issued.token),
        };
        self.email.send_best_effort(&email, &message).await;

        tracing::info!("Registration pending email verification");
        Ok(MessageResponse::ok(
            "Verification email sent to your email. Please check and verify your account.",
        ))
    }

    pub async fn verify_email(
        &self,
        req: VerifyEmailRequest,
    ) -> Result<MessageResponse, ServiceError> {
        tally("verify_email", self.verify_email_inner(req).await)
    }

    async fn verify_email_inner(
        &self,
        req: VerifyEmailRequest,
    ) -> Result<MessageResponse, ServiceError> {
        let pending = self
            .tokens
            .verify::<PendingRegistration>(&req.token)?
            .claims;

        let already_verified =
            || ServiceError::AlreadyExists("User already verified. Please log in.".to_string());

        if self
            .credentials
            .find_by_email(&pending.email)
            .await?
            .is_some()
        {
            return Err(already_verified());
        }

        let user = User::verified(
            pending.name,
            pending.email,
            pending.password_hash,
            self.clock.now(),
        );
        // A concurrent redemption of the same token loses here.
        if !self.credentials.insert_if_absent(&user).await? {
            return Err(already_verified());
        }

        tracing::info!(user_id = %user.id, "Identity materialised from verified email");
        Ok(MessageResponse::ok(
            "Email verified successfully. You can now log in.",
        ))
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let result = self.login_inner(req).await;
        match &result {
            Ok(LoginResponse::Session(_)) => record_auth_event("login", "session"),
            Ok(LoginResponse::StepUp(_)) => record_auth_event("login", "step_up"),
            Err(e) => record_auth_event("login", e.kind()),
        }
        result
    }

    async fn login_inner(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let email = normalize_email(&req.email);

        let user = self
            .credentials
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let valid = verify_password(&Password::new(req.password), &user.password_hash)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password verify error: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.email_verified {
            tracing::warn!(user_id = %user.id, "Login rejected: email unverified");
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.two_factor_enabled {
            let grant = self.sessions.issue(&user).await?;
            return Ok(LoginResponse::Session(SessionResponse {
                success: true,
                message: "Login successful".to_string(),
                token: grant.token,
                user: grant.user,
            }));
        }

        let now = self.clock.now();
        let code = generate_otp();
        let challenge = OtpChallenge {
            code: code.clone(),
            expires_at: now + self.token_config.otp_ttl(),
        };
        self.credentials.set_otp(&user.id, &challenge).await?;

        let step_up = self.tokens.issue(
            &StepUpClaims {
                sub: user.id.clone(),
            },
            self.token_config.step_up_ttl(),
        )?;

        let message = EmailMessage::TwoFactorCode {
            name: user.name.clone(),
            code,
        };
        self.email.send_best_effort(&user.email, &message).await;

        tracing::info!(user_id = %user.id, "Password accepted, OTP step-up issued");
        Ok(LoginResponse::StepUp(StepUpResponse {
            success: true,
            message: "OTP sent to your email. Enter the OTP to log in.".to_string(),
            requires_two_factor: true,
            token: step_up.token,
        }))
    }

    pub async fn verify_two_factor(
        &self,
        req: VerifyTwoFactorRequest,
    ) -> Result<SessionResponse, ServiceError> {
        tally("verify_two_factor", self.verify_two_factor_inner(req).await)
    }

    async fn verify_two_factor_inner(
        &self,
        req: VerifyTwoFactorRequest,
    ) -> Result<SessionResponse, ServiceError> {
        let claims = self.tokens.verify::<StepUpClaims>(&req.token)?.claims;

        let user = self
            .credentials
            .find_by_id(&claims.sub)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        // A consumed challenge reads the same as an expired one.
        let challenge = user.otp.as_ref().ok_or(ServiceError::OtpExpired)?;
        if challenge.is_expired(self.clock.now()) {
            return Err(ServiceError::OtpExpired);
        }
        if !constant_time_eq(req.otp.trim(), &challenge.code) {
            tracing::warn!(user_id = %user.id, "OTP mismatch");
            return Err(ServiceError::OtpMismatch);
        }

        let grant = self.sessions.issue(&user).await?;
        Ok(SessionResponse {
            success: true,
            message: "Login successful".to_string(),
            token: grant.token,
            user: grant.user,
        })
    }

    pub async fn forgot_password(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<MessageResponse, ServiceError> {
        tally("forgot_password", self.forgot_password_inner(req).await)
    }

    async fn forgot_password_inner(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<MessageResponse, ServiceError> {
        let email = normalize_email(&req.email);
        let user = self
            .credentials
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if !user.email_verified {
            return Err(ServiceError::EmailUnverified);
        }

        let now = self.clock.now();
        let issued = self.tokens.issue(
            &PasswordResetClaims {
                sub: user.id.clone(),
            },
            self.token_config.password_reset_ttl(),
        )?;

        let entry = VerificationEntry::new(
            user.id.clone(),
            VerificationPurpose::PasswordReset,
            hash_token(&issued.token),
            issued.expires_at,
            now,
        );
        if !self.verifications.insert_if_vacant(&entry, now).await? {
            return Err(ServiceError::AlreadyExists(
                "Reset password request already sent".to_string(),
            ));
        }

        let message = EmailMessage::ResetPassword {
            name: user.name.clone(),
            link: format!(
                "{}/auth/reset-password?token={}",
                self.frontend_url, issued.token
            ),
        };
        self.email.send_best_effort(&user.email, &message).await;

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(MessageResponse::ok("Reset password email sent"))
    }

    pub async fn reset_password(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<MessageResponse, ServiceError> {
        tally("reset_password", self.reset_password_inner(req).await)
    }

    async fn reset_password_inner(
        &self,
        req: ResetPasswordRequest,
    ) -> Result<MessageResponse, ServiceError> {
        if req.new_password != req.confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }

        let claims = self.tokens.verify::<PasswordResetClaims>(&req.token)?.claims;
        let token_hash = hash_token(&req.token);

        // Everything fallible runs before the ledger entry is consumed.
        let live = self
            .verifications
            .find(&claims.sub, VerificationPurpose::PasswordReset)
            .await?
            .filter(|entry| constant_time_eq(&entry.token_hash, &token_hash))
            .ok_or(ServiceError::TokenInvalid)?;
        if live.is_expired(self.clock.now()) {
            return Err(ServiceError::TokenExpired);
        }
        if self.credentials.find_by_id(&claims.sub).await?.is_none() {
            return Err(ServiceError::NotFound("User"));
        }
        let password_hash = hash_password(&Password::new(req.new_password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        // A signed token without its ledger entry has been revoked or already used.
        self.verifications
            .take(&claims.sub, VerificationPurpose::PasswordReset, &token_hash)
            .await?
            .ok_or(ServiceError::TokenInvalid)?;
        self.credentials
            .update_password(&claims.sub, &password_hash, self.clock.now())
            .await?;

        tracing::info!(user_id = %claims.sub, "Password reset completed");
        Ok(MessageResponse::ok("Password reset successfully"))
    }
}
