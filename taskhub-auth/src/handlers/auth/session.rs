use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{LoginRequest, LoginResponse, SessionResponse, VerifyTwoFactorRequest},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password
///
/// Returns a session directly, or `requires2FA` with a step-up token when
/// two-factor authentication is enabled.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued or OTP step-up required", body = LoginResponse),
        (status = 400, description = "Email not verified", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.login(req).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Complete a two-factor login with the emailed OTP
#[utoipa::path(
    post,
    path = "/auth/verify-twofa-enabled",
    request_body = VerifyTwoFactorRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 400, description = "OTP expired or wrong token purpose", body = ErrorResponse),
        (status = 401, description = "Invalid or expired step-up token", body = ErrorResponse),
        (status = 403, description = "Wrong OTP", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_two_factor(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyTwoFactorRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.verify_two_factor(req).await?;
    Ok((StatusCode::OK, Json(res)))
}
