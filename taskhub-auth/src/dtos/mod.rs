pub mod auth;
pub mod project;
pub mod user;
pub mod workspace;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body returned by operations whose only result is a human-readable confirmation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Operation completed")]
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Uniform error body rendered by `AppError`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "Invalid email or password")]
    pub message: String,
}
