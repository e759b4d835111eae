pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, metrics_middleware, request_id_middleware,
    security_headers_middleware, IpRateLimiter, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, ServiceConfig, SwaggerMode};
use crate::db::Stores;
use crate::services::{
    AccountService, AuthService, Clock, EmailProvider, ProjectService, SessionIssuer,
    TokenService, WorkspaceService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::auth::registration::register,
        handlers::auth::registration::verify_email,
        handlers::auth::session::login,
        handlers::auth::session::verify_two_factor,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::user::toggle_two_factor,
        handlers::user::change_password,
        handlers::workspace::create_workspace,
        handlers::workspace::list_workspaces,
        handlers::workspace::get_workspace,
        handlers::workspace::update_workspace,
        handlers::workspace::delete_workspace,
        handlers::workspace::invite_member,
        handlers::workspace::accept_generated_invite,
        handlers::workspace::accept_invite_by_token,
        handlers::workspace::change_ownership,
        handlers::project::create_project,
        handlers::project::list_workspace_projects,
        handlers::project::get_project,
        handlers::project::update_project,
        handlers::project::delete_project,
    ),
    components(
        schemas(
            dtos::MessageResponse,
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::VerifyEmailRequest,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::SessionResponse,
            dtos::auth::StepUpResponse,
            dtos::auth::VerifyTwoFactorRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::user::ProfileResponse,
            dtos::user::UpdateProfileRequest,
            dtos::user::TwoFactorToggleResponse,
            dtos::user::ChangePasswordRequest,
            dtos::workspace::CreateWorkspaceRequest,
            dtos::workspace::UpdateWorkspaceRequest,
            dtos::workspace::InviteMemberRequest,
            dtos::workspace::AcceptInviteTokenRequest,
            dtos::workspace::ChangeOwnershipRequest,
            dtos::workspace::WorkspaceMemberView,
            dtos::workspace::WorkspaceView,
            dtos::workspace::WorkspaceResponse,
            dtos::workspace::WorkspaceListResponse,
            dtos::workspace::MembershipResponse,
            dtos::project::ProjectMemberInput,
            dtos::project::CreateProjectRequest,
            dtos::project::UpdateProjectRequest,
            dtos::project::ProjectMemberView,
            dtos::project::ProjectView,
            dtos::project::ProjectResponse,
            dtos::project::WorkspaceProjectsResponse,
            models::PublicUser,
            models::WorkspaceRole,
            models::ProjectRole,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login, two-factor and password reset"),
        (name = "User", description = "Self-service account management"),
        (name = "Workspace", description = "Workspaces, invitations and ownership"),
        (name = "Project", description = "Projects and project roles"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub stores: Stores,
    pub sessions: SessionIssuer,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub workspace_service: WorkspaceService,
    pub project_service: ProjectService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub forgot_password_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wires every service from the configuration and its collaborators.
    pub fn new(
        config: ServiceConfig,
        stores: Stores,
        email: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let token_config = config.tokens.clone();
        let tokens = TokenService::new(&token_config, clock.clone());

        let sessions = SessionIssuer::new(
            tokens.clone(),
            stores.credentials.clone(),
            clock.clone(),
            token_config.session_ttl(),
        );

        let auth_service = AuthService::new(
            stores.credentials.clone(),
            stores.verifications.clone(),
            tokens.clone(),
            sessions.clone(),
            email.clone(),
            clock.clone(),
            token_config.clone(),
            config.frontend_url.clone(),
        );

        let account_service = AccountService::new(stores.credentials.clone(), clock.clone());

        let workspace_service = WorkspaceService::new(
            stores.workspaces.clone(),
            stores.projects.clone(),
            stores.invitations.clone(),
            stores.credentials.clone(),
            stores.activity.clone(),
            tokens,
            email,
            clock.clone(),
            token_config,
            config.frontend_url.clone(),
        );

        let project_service = ProjectService::new(
            stores.projects.clone(),
            stores.workspaces.clone(),
            stores.activity.clone(),
            clock,
        );

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let register_rate_limiter =
            create_ip_rate_limiter(limits.register_attempts, limits.register_window_seconds);
        let forgot_password_rate_limiter = create_ip_rate_limiter(
            limits.forgot_password_attempts,
            limits.forgot_password_window_seconds,
        );
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            stores,
            sessions,
            auth_service,
            account_service,
            workspace_service,
            project_service,
            login_rate_limiter,
            register_rate_limiter,
            forgot_password_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let forgot_password_route = Router::new()
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .layer(from_fn_with_state(
            state.forgot_password_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let authenticated = Router::new()
        .route(
            "/users/profile",
            get(handlers::user::get_profile).put(handlers::user::update_profile),
        )
        .route("/users/twofaenabled", put(handlers::user::toggle_two_factor))
        .route("/users/change-password", post(handlers::user::change_password))
        .route(
            "/workspaces",
            get(handlers::workspace::list_workspaces).post(handlers::workspace::create_workspace),
        )
        .route(
            "/workspaces/accept-invite-token",
            post(handlers::workspace::accept_invite_by_token),
        )
        .route(
            "/workspaces/:workspace_id",
            get(handlers::workspace::get_workspace)
                .put(handlers::workspace::update_workspace)
                .delete(handlers::workspace::delete_workspace),
        )
        .route(
            "/workspaces/:workspace_id/invite-member",
            post(handlers::workspace::invite_member),
        )
        .route(
            "/workspaces/:workspace_id/accept-generate-invite",
            post(handlers::workspace::accept_generated_invite),
        )
        .route(
            "/workspaces/:workspace_id/change-ownership",
            put(handlers::workspace::change_ownership),
        )
        .route(
            "/workspaces/:workspace_id/projects",
            get(handlers::project::list_workspace_projects).post(handlers::project::create_project),
        )
        .route(
            "/projects/:project_id",
            get(handlers::project::get_project)
                .put(handlers::project::update_project)
                .delete(handlers::project::delete_project),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    app.route("/auth/verify-email", post(handlers::auth::verify_email))
        .route(
            "/auth/verify-twofa-enabled",
            post(handlers::auth::verify_two_factor),
        )
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .merge(login_route)
        .merge(register_route)
        .merge(forgot_password_route)
        .merge(authenticated)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store backend unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.stores.health.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": format!("{:?}", state.config.storage.backend),
        }
    })))
}
