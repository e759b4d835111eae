//! Shared setup for taskhub-auth integration tests.
//!
//! Every test gets its own router over in-memory stores, a recording email
//! provider and a manual clock.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use taskhub_auth::{
    build_router,
    config::{
        EmailBackend, EmailConfig, Environment, MongoConfig, RateLimitConfig, SecurityConfig,
        ServiceConfig, StorageBackend, StorageConfig, SwaggerConfig, SwaggerMode, TokenConfig,
    },
    db::{InMemoryActivityRecorder, Stores},
    services::{EmailMessage, ManualClock, MockEmailService},
    AppState,
};
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const FRONTEND_URL: &str = "http://localhost:5173";

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "taskhub-auth-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            mongodb: MongoConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "taskhub_test".to_string(),
            },
        },
        tokens: TokenConfig {
            secret: "integration-test-secret-that-is-long-enough-0123".to_string(),
            ..TokenConfig::default()
        },
        email: EmailConfig {
            backend: EmailBackend::Log,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_password: String::new(),
            from_address: "TaskHub <no-reply@taskhub.test>".to_string(),
        },
        frontend_url: FRONTEND_URL.to_string(),
        security: SecurityConfig {
            allowed_origins: vec![FRONTEND_URL.to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig::default(),
    }
}

/// A verified account with a live session.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub email: Arc<MockEmailService>,
    pub clock: Arc<ManualClock>,
    pub activity: Arc<InMemoryActivityRecorder>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config())
    }

    pub fn spawn_with(config: ServiceConfig) -> Self {
        let email = Arc::new(MockEmailService::new());
        let clock = Arc::new(ManualClock::default());
        let activity = Arc::new(InMemoryActivityRecorder::default());

        let mut stores = Stores::in_memory();
        stores.activity = activity.clone();

        let state = AppState::new(config, stores, email.clone(), clock.clone());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            email,
            clock,
            activity,
        }
    }

    /// Sends one request through the router and decodes the JSON body (Null when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        client_ip: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(ip) = client_ip {
            builder = builder.header("x-forwarded-for", ip);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body), None).await
    }

    pub async fn post_empty(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, None, None).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body), None).await
    }

    pub async fn put_empty(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, None, None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None, None).await
    }

    /// Most recent email sent to `email`.
    pub fn last_email(&self, email: &str) -> EmailMessage {
        self.email
            .last_to(email)
            .unwrap_or_else(|| panic!("no email sent to {}", email))
    }

    /// Token carried by the link in the most recent email to `email`.
    pub fn token_from_last_email(&self, email: &str) -> String {
        let message = self.last_email(email);
        let link = message.link().expect("email carries no link");
        token_from_link(link)
    }

    /// Code carried by the most recent two-factor email to `email`.
    pub fn otp_from_last_email(&self, email: &str) -> String {
        match self.last_email(email) {
            EmailMessage::TwoFactorCode { code, .. } => code,
            other => panic!("expected a two-factor email, got {:?}", other),
        }
    }

    pub async fn register(&self, name: &str, email: &str) -> (StatusCode, Value) {
        self.post(
            "/auth/register",
            None,
            json!({ "name": name, "email": email, "password": TEST_PASSWORD }),
        )
        .await
    }

    /// Registers, redeems the verification email and logs in.
    pub async fn signup(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self.register(name, email).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let token = self.token_from_last_email(email);
        let (status, body) = self
            .post("/auth/verify-email", None, json!({ "token": token }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "verify failed: {}", body);

        self.login(name, email).await
    }

    pub async fn login(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                json!({ "email": email, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_workspace(&self, owner: &TestUser, name: &str) -> String {
        let (status, body) = self
            .post("/workspaces", Some(&owner.token), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create workspace failed: {}", body);
        body["workspace"]["id"].as_str().unwrap().to_string()
    }

    /// Adds `user` to the workspace through the generated-invite path (joins as MEMBER).
    pub async fn join_workspace(&self, user: &TestUser, workspace_id: &str) {
        let (status, body) = self
            .post_empty(
                &format!("/workspaces/{}/accept-generate-invite", workspace_id),
                Some(&user.token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "join failed: {}", body);
    }

    /// Invites `invitee` with `role` and accepts the emailed token as them.
    pub async fn invite_and_accept(
        &self,
        inviter: &TestUser,
        invitee: &TestUser,
        workspace_id: &str,
        role: &str,
    ) {
        let (status, body) = self
            .post(
                &format!("/workspaces/{}/invite-member", workspace_id),
                Some(&inviter.token),
                json!({ "email": invitee.email, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "invite failed: {}", body);

        let token = self.token_from_last_email(&invitee.email);
        let (status, body) = self
            .post(
                "/workspaces/accept-invite-token",
                Some(&invitee.token),
                json!({ "token": token }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
    }
}

/// Extracts the `token=` or `tk=` query value from an emailed link.
pub fn token_from_link(link: &str) -> String {
    let query = link.split_once('?').map(|(_, q)| q).unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token" || *key == "tk")
        .map(|(_, value)| value.to_string())
        .unwrap_or_else(|| panic!("no token in link {}", link))
}
