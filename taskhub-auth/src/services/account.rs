use std::sync::Arc;

use super::{clock::Clock, error::ServiceError};
use crate::db::CredentialStore;
use crate::dtos::{
    user::{ChangePasswordRequest, ProfileResponse, TwoFactorToggleResponse, UpdateProfileRequest},
    MessageResponse,
};
use crate::models::{PublicUser, User};
use crate::utils::{hash_password, non_blank, verify_password, Password};

/// Self-service operations on the caller's own identity.
#[derive(Clone)]
pub struct AccountService {
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(credentials: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { credentials, clock }
    }

    async fn reload(&self, user_id: &str) -> Result<User, ServiceError> {
        self.credentials
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn profile(&self, user_id: &str) -> Result<ProfileResponse, ServiceError> {
        let user = self.reload(user_id).await?;
        Ok(ProfileResponse {
            success: true,
            user: PublicUser::from(&user),
        })
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        let name = non_blank(&req.name, "Name")?;

        self.credentials
            .update_name(user_id, &name, self.clock.now())
            .await?;
        self.profile(user_id).await
    }

    /// Flips the 2FA flag; turning it off also drops any pending OTP.
    pub async fn toggle_two_factor(
        &self,
        user_id: &str,
    ) -> Result<TwoFactorToggleResponse, ServiceError> {
        let user = self.reload(user_id).await?;
        let enabled = !user.two_factor_enabled;

        self.credentials
            .set_two_factor(user_id, enabled, self.clock.now())
            .await?;

        tracing::info!(user_id = %user_id, enabled, "Two-factor setting changed");
        Ok(TwoFactorToggleResponse {
            success: true,
            message: if enabled {
                "Two-factor authentication enabled".to_string()
            } else {
                "Two-factor authentication disabled".to_string()
            },
            two_factor_enabled: enabled,
        })
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        req: ChangePasswordRequest,
    ) -> Result<MessageResponse, ServiceError> {
        if req.new_password != req.confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }

        let user = self.reload(user_id).await?;
        let valid = verify_password(&Password::new(req.current_password), &user.password_hash)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password verify error: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %user_id, "Password change rejected: wrong current password");
            return Err(ServiceError::WrongCurrentPassword);
        }

        let password_hash = hash_password(&Password::new(req.new_password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;
        self.credentials
            .update_password(user_id, &password_hash, self.clock.now())
            .await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(MessageResponse::ok("Password changed successfully"))
    }
}
