use chrono::Duration;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::{env, fmt, str::FromStr};

const MIN_PROD_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageConfig,
    pub tokens: TokenConfig,
    pub email: EmailConfig,
    pub frontend_url: String,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongodb: MongoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Signing secrets and lifetimes for every purpose-bound token.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    /// Accepted for verification only, so rotated secrets keep outstanding tokens valid.
    pub previous_secrets: Vec<String>,
    pub session_ttl_days: i64,
    pub step_up_ttl_minutes: i64,
    pub otp_ttl_minutes: i64,
    pub password_reset_ttl_minutes: i64,
    pub email_verification_ttl_minutes: i64,
    pub invite_ttl_days: i64,
}

impl TokenConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::days(self.session_ttl_days)
    }

    pub fn step_up_ttl(&self) -> Duration {
        Duration::minutes(self.step_up_ttl_minutes)
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.otp_ttl_minutes)
    }

    pub fn password_reset_ttl(&self) -> Duration {
        Duration::minutes(self.password_reset_ttl_minutes)
    }

    pub fn email_verification_ttl(&self) -> Duration {
        Duration::minutes(self.email_verification_ttl_minutes)
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::days(self.invite_ttl_days)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            previous_secrets: Vec::new(),
            session_ttl_days: 7,
            step_up_ttl_minutes: 5,
            otp_ttl_minutes: 10,
            password_reset_ttl_minutes: 15,
            email_verification_ttl_minutes: 60,
            invite_ttl_days: 7,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("previous_secrets", &self.previous_secrets.len())
            .field("session_ttl_days", &self.session_ttl_days)
            .field("step_up_ttl_minutes", &self.step_up_ttl_minutes)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .field(
                "email_verification_ttl_minutes",
                &self.email_verification_ttl_minutes,
            )
            .field("invite_ttl_days", &self.invite_ttl_days)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmailBackend {
    Smtp,
    /// Logs recipient and subject instead of delivering.
    Log,
}

#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    pub backend: EmailBackend,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from_address: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("backend", &self.backend)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub forgot_password_attempts: u32,
    pub forgot_password_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_attempts: 5,
            login_window_seconds: 900,
            register_attempts: 3,
            register_window_seconds: 3600,
            forgot_password_attempts: 3,
            forgot_password_window_seconds: 3600,
            global_ip_limit: 100,
            global_ip_window_seconds: 60,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = get_env("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let storage_backend: StorageBackend = get_env("STORAGE_BACKEND", Some("mongodb"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let needs_mongo = storage_backend == StorageBackend::Mongodb;

        let email_backend: EmailBackend = get_env("EMAIL_BACKEND", Some("smtp"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let needs_smtp = email_backend == EmailBackend::Smtp;

        let token_defaults = TokenConfig::default();
        let limit_defaults = RateLimitConfig::default();

        let config = ServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("taskhub-auth"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            storage: StorageConfig {
                backend: storage_backend,
                mongodb: MongoConfig {
                    uri: get_env(
                        "MONGODB_URI",
                        Some("mongodb://localhost:27017"),
                        is_prod && needs_mongo,
                    )?,
                    database: get_env("MONGODB_DATABASE", Some("taskhub"), is_prod && needs_mongo)?,
                },
            },
            tokens: TokenConfig {
                secret: get_env("TOKEN_SECRET", None, true)?,
                previous_secrets: env::var("TOKEN_PREVIOUS_SECRETS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                session_ttl_days: parse_env("SESSION_TTL_DAYS", token_defaults.session_ttl_days)?,
                step_up_ttl_minutes: parse_env(
                    "STEP_UP_TTL_MINUTES",
                    token_defaults.step_up_ttl_minutes,
                )?,
                otp_ttl_minutes: parse_env("OTP_TTL_MINUTES", token_defaults.otp_ttl_minutes)?,
                password_reset_ttl_minutes: parse_env(
                    "PASSWORD_RESET_TTL_MINUTES",
                    token_defaults.password_reset_ttl_minutes,
                )?,
                email_verification_ttl_minutes: parse_env(
                    "EMAIL_VERIFICATION_TTL_MINUTES",
                    token_defaults.email_verification_ttl_minutes,
                )?,
                invite_ttl_days: parse_env("INVITE_TTL_DAYS", token_defaults.invite_ttl_days)?,
            },
            email: EmailConfig {
                backend: email_backend,
                smtp_host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod && needs_smtp)?,
                smtp_port: parse_env("SMTP_PORT", 587)?,
                smtp_user: get_env("SMTP_USER", Some(""), is_prod && needs_smtp)?,
                smtp_password: get_env("SMTP_PASSWORD", Some(""), is_prod && needs_smtp)?,
                from_address: get_env(
                    "SMTP_FROM",
                    Some("TaskHub <no-reply@taskhub.local>"),
                    is_prod && needs_smtp,
                )?,
            },
            frontend_url: get_env("FRONTEND_URL", Some("http://localhost:5173"), is_prod)?
                .trim_end_matches('/')
                .to_string(),
            security: SecurityConfig {
                allowed_origins: split_list(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:5173"),
                    is_prod,
                )?),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", limit_defaults.login_attempts)?,
                login_window_seconds: parse_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    limit_defaults.login_window_seconds,
                )?,
                register_attempts: parse_env(
                    "RATE_LIMIT_REGISTER_ATTEMPTS",
                    limit_defaults.register_attempts,
                )?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    limit_defaults.register_window_seconds,
                )?,
                forgot_password_attempts: parse_env(
                    "RATE_LIMIT_FORGOT_PASSWORD_ATTEMPTS",
                    limit_defaults.forgot_password_attempts,
                )?,
                forgot_password_window_seconds: parse_env(
                    "RATE_LIMIT_FORGOT_PASSWORD_WINDOW_SECONDS",
                    limit_defaults.forgot_password_window_seconds,
                )?,
                global_ip_limit: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_LIMIT",
                    limit_defaults.global_ip_limit,
                )?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    limit_defaults.global_ip_window_seconds,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.tokens.secret.is_empty() {
            return Err(config_error("TOKEN_SECRET must not be empty"));
        }

        let lifetimes = [
            ("SESSION_TTL_DAYS", self.tokens.session_ttl_days),
            ("STEP_UP_TTL_MINUTES", self.tokens.step_up_ttl_minutes),
            ("OTP_TTL_MINUTES", self.tokens.otp_ttl_minutes),
            ("PASSWORD_RESET_TTL_MINUTES", self.tokens.password_reset_ttl_minutes),
            (
                "EMAIL_VERIFICATION_TTL_MINUTES",
                self.tokens.email_verification_ttl_minutes,
            ),
            ("INVITE_TTL_DAYS", self.tokens.invite_ttl_days),
        ];
        if let Some((key, _)) = lifetimes.iter().find(|(_, value)| *value <= 0) {
            return Err(config_error(&format!("{} must be positive", key)));
        }

        if self.environment == Environment::Prod {
            if self.tokens.secret.len() < MIN_PROD_SECRET_LEN {
                return Err(config_error(&format!(
                    "TOKEN_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_LEN
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }

            if self.storage.backend == StorageBackend::Memory {
                return Err(config_error("In-memory storage is not allowed in production"));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env(key: &str, default: Option<&str>, required: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) if required => Err(config_error(&format!("{} is required but not set", key))),
        Err(_) => default
            .map(str::to_string)
            .ok_or_else(|| config_error(&format!("{} is required but not set", key))),
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| config_error(&format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" => Ok(StorageBackend::Mongodb),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl FromStr for EmailBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smtp" => Ok(EmailBackend::Smtp),
            "log" => Ok(EmailBackend::Log),
            _ => Err(format!("Invalid email backend: {}", s)),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn prod_config() -> ServiceConfig {
        ServiceConfig {
            common: core_config::Config {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 8080,
            },
            environment: Environment::Prod,
            service_name: "taskhub-auth".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            storage: StorageConfig {
                backend: StorageBackend::Mongodb,
                mongodb: MongoConfig {
                    uri: "mongodb://localhost:27017".to_string(),
                    database: "taskhub".to_string(),
                },
            },
            tokens: TokenConfig {
                secret: "a".repeat(MIN_PROD_SECRET_LEN),
                ..TokenConfig::default()
            },
            email: EmailConfig {
                backend: EmailBackend::Log,
                smtp_host: String::new(),
                smtp_port: 587,
                smtp_user: String::new(),
                smtp_password: String::new(),
                from_address: "no-reply@example.com".to_string(),
            },
            frontend_url: "https://app.example.com".to_string(),
            security: SecurityConfig {
                allowed_origins: vec!["https://app.example.com".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Disabled,
            },
            rate_limit: RateLimitConfig::default(),
        }
    }

    #[test]
    fn accepts_valid_production_config() {
        assert!(prod_config().validate().is_ok());
    }

    #[test]
    fn rejects_short_secret_in_production() {
        let mut cfg = prod_config();
        cfg.tokens.secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_wildcard_origin_in_production() {
        let mut cfg = prod_config();
        cfg.security.allowed_origins = vec!["*".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_lifetimes() {
        let mut cfg = prod_config();
        cfg.tokens.otp_ttl_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = prod_config();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains(&cfg.tokens.secret));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn parses_backends_case_insensitively() {
        assert_eq!("MEMORY".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("log".parse::<EmailBackend>(), Ok(EmailBackend::Log));
        assert!("redis".parse::<StorageBackend>().is_err());
    }
}
