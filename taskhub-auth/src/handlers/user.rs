use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        user::{
            ChangePasswordRequest, ProfileResponse, TwoFactorToggleResponse, UpdateProfileRequest,
        },
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentUser,
    utils::ValidatedJson,
    AppState,
};

/// Current user's profile
#[utoipa::path(
    get,
    path = "/users/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let res = state.account_service.profile(&user.id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Update display name
#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.account_service.update_profile(&user.id, req).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Toggle two-factor authentication
#[utoipa::path(
    put,
    path = "/users/twofaenabled",
    responses(
        (status = 200, description = "Two-factor setting flipped", body = TwoFactorToggleResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn toggle_two_factor(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let res = state.account_service.toggle_two_factor(&user.id).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Change password with the current one
#[utoipa::path(
    post,
    path = "/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New passwords differ", body = ErrorResponse),
        (status = 403, description = "Current password is wrong", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.account_service.change_password(&user.id, req).await?;
    Ok((StatusCode::OK, Json(res)))
}
