use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email first")]
    EmailUnverified,

    #[error("Invalid or malformed token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token purpose")]
    TokenPurposeMismatch,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("You are already a member of this workspace")]
    AlreadyMember,

    #[error("You are not a member of this {0}")]
    NotAMember(&'static str),

    #[error("You are not invited to join this workspace")]
    NotInvited,

    #[error("{0}")]
    InsufficientRole(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid OTP. Please enter the correct code")]
    OtpMismatch,

    #[error("OTP expired. Please login again")]
    OtpExpired,

    #[error("Invalid old password")]
    WrongCurrentPassword,

    #[error("New password and confirm password must match")]
    PasswordMismatch,

    #[error("{0}")]
    Validation(String),
}

impl ServiceError {
    /// Short label used for the `outcome` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "database",
            ServiceError::Internal(_) => "internal",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::EmailUnverified => "email_unverified",
            ServiceError::TokenInvalid => "token_invalid",
            ServiceError::TokenExpired => "token_expired",
            ServiceError::TokenPurposeMismatch => "token_purpose_mismatch",
            ServiceError::AlreadyExists(_) => "already_exists",
            ServiceError::AlreadyMember => "already_member",
            ServiceError::NotAMember(_) => "not_a_member",
            ServiceError::NotInvited => "not_invited",
            ServiceError::InsufficientRole(_) => "insufficient_role",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::OtpMismatch => "otp_mismatch",
            ServiceError::OtpExpired => "otp_expired",
            ServiceError::WrongCurrentPassword => "wrong_current_password",
            ServiceError::PasswordMismatch => "password_mismatch",
            ServiceError::Validation(_) => "validation",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = anyhow::anyhow!(err.to_string());
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials
            | ServiceError::TokenInvalid
            | ServiceError::TokenExpired => AppError::Unauthorized(message),
            ServiceError::EmailUnverified
            | ServiceError::TokenPurposeMismatch
            | ServiceError::OtpExpired
            | ServiceError::PasswordMismatch
            | ServiceError::Validation(_) => AppError::BadRequest(message),
            ServiceError::AlreadyExists(_) | ServiceError::AlreadyMember => {
                AppError::Conflict(message)
            }
            ServiceError::NotAMember(_)
            | ServiceError::NotInvited
            | ServiceError::InsufficientRole(_)
            | ServiceError::OtpMismatch
            | ServiceError::WrongCurrentPassword => AppError::Forbidden(message),
            ServiceError::NotFound(_) => AppError::NotFound(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: ServiceError) -> StatusCode {
        AppError::from(err).status()
    }

    #[test]
    fn maps_each_kind_to_its_status() {
        assert_eq!(status(ServiceError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::TokenPurposeMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::AlreadyMember), StatusCode::CONFLICT);
        assert_eq!(status(ServiceError::NotAMember("workspace")), StatusCode::FORBIDDEN);
        assert_eq!(status(ServiceError::OtpMismatch), StatusCode::FORBIDDEN);
        assert_eq!(status(ServiceError::NotFound("Workspace")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ServiceError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn renders_scoped_messages() {
        assert_eq!(
            ServiceError::NotAMember("project").to_string(),
            "You are not a member of this project"
        );
        assert_eq!(ServiceError::NotFound("Invitation").to_string(), "Invitation not found");
    }
}
