use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::{sync::Mutex, time::Duration};

use super::error::ServiceError;
use crate::config::EmailConfig;

/// Transactional messages the service sends. Links already carry their token.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailMessage {
    VerifyEmail { name: String, link: String },
    TwoFactorCode { name: String, code: String },
    ResetPassword { name: String, link: String },
    WorkspaceInvite { name: String, workspace: String, link: String },
}

impl EmailMessage {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailMessage::VerifyEmail { .. } => "Verify your email",
            EmailMessage::TwoFactorCode { .. } => "Your login code",
            EmailMessage::ResetPassword { .. } => "Reset your password",
            EmailMessage::WorkspaceInvite { .. } => "You have been invited to a workspace",
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            EmailMessage::VerifyEmail { link, .. }
            | EmailMessage::ResetPassword { link, .. }
            | EmailMessage::WorkspaceInvite { link, .. } => Some(link),
            EmailMessage::TwoFactorCode { .. } => None,
        }
    }

    fn plain_body(&self) -> String {
        match self {
            EmailMessage::VerifyEmail { name, link } => format!(
                "Hi {},\n\nConfirm your email address to finish creating your account:\n\n{}\n\nIf you did not sign up, ignore this email.",
                name, link
            ),
            EmailMessage::TwoFactorCode { name, code } => format!(
                "Hi {},\n\nYour login code is {}. It expires in a few minutes.\n\nIf this was not you, change your password.",
                name, code
            ),
            EmailMessage::ResetPassword { name, link } => format!(
                "Hi {},\n\nUse the link below to choose a new password:\n\n{}\n\nIf you did not ask for this, ignore this email.",
                name, link
            ),
            EmailMessage::WorkspaceInvite {
                name,
                workspace,
                link,
            } => format!(
                "Hi {},\n\nYou have been invited to join {}:\n\n{}",
                name, workspace, link
            ),
        }
    }

    fn html_body(&self) -> String {
        let (heading, text, action) = match self {
            EmailMessage::VerifyEmail { name, link } => (
                "Verify your email".to_string(),
                format!(
                    "Hi {}, confirm your email address to finish creating your account.",
                    escape_html(name)
                ),
                Some(("Verify email", link)),
            ),
            EmailMessage::TwoFactorCode { name, code } => (
                "Your login code".to_string(),
                format!(
                    "Hi {}, your login code is <strong>{}</strong>.",
                    escape_html(name),
                    escape_html(code)
                ),
                None,
            ),
            EmailMessage::ResetPassword { name, link } => (
                "Reset your password".to_string(),
                format!("Hi {}, use the button below to choose a new password.", escape_html(name)),
                Some(("Reset password", link)),
            ),
            EmailMessage::WorkspaceInvite {
                name,
                workspace,
                link,
            } => (
                format!("Join {}", escape_html(workspace)),
                format!(
                    "Hi {}, you have been invited to join <strong>{}</strong>.",
                    escape_html(name),
                    escape_html(workspace)
                ),
                Some(("Accept invitation", link)),
            ),
        };

        let button = action
            .map(|(label, href)| {
                format!(
                    r#"<p><a href="{}" style="background-color: #2563eb; color: white; padding: 12px 18px; text-decoration: none; border-radius: 4px;">{}</a></p>"#,
                    escape_html(href),
                    label
                )
            })
            .unwrap_or_default();

        format!(
            r#"<html><body style="font-family: Arial, sans-serif;"><h2>{}</h2><p>{}</p>{}</body></html>"#,
            heading, text, button
        )
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to_email: &str, message: &EmailMessage) -> Result<(), ServiceError>;

    /// Delivery failures are logged and swallowed; already-issued tokens stay valid.
    async fn send_best_effort(&self, to_email: &str, message: &EmailMessage) {
        if let Err(e) = self.send(to_email, message).await {
            tracing::warn!(error = %e, subject = %message.subject(), "Email delivery failed");
        }
    }
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_address: String,
}

impl SmtpEmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

        let mailer = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.smtp_host, "Email service initialized with SMTP relay");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send(&self, to_email: &str, message: &EmailMessage) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e: lettre::address::AddressError| ServiceError::Internal(e.into()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| ServiceError::Internal(e.into()))?)
            .subject(message.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.plain_body()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html_body()),
                    ),
            )
            .map_err(|e| ServiceError::Internal(e.into()))?;

        // SmtpTransport is blocking.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(subject = %message.subject(), "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, subject = %message.subject(), "Failed to send email");
                Err(ServiceError::Internal(anyhow::anyhow!(
                    "SMTP delivery failed: {}",
                    e
                )))
            }
        }
    }
}

/// Development provider: logs that a message would have been sent, never its contents.
#[derive(Clone, Default)]
pub struct LogEmailService;

#[async_trait]
impl EmailProvider for LogEmailService {
    async fn send(&self, _to_email: &str, message: &EmailMessage) -> Result<(), ServiceError> {
        tracing::info!(subject = %message.subject(), "Email delivery skipped (log backend)");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub message: EmailMessage,
}

/// Records every message; can be switched to fail delivery.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
    failing: Mutex<bool>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most recent message addressed to `to_email`.
    pub fn last_to(&self, to_email: &str) -> Option<EmailMessage> {
        self.sent()
            .into_iter()
            .rev()
            .find(|email| email.to == to_email)
            .map(|email| email.message)
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send(&self, to_email: &str, message: &EmailMessage) -> Result<(), ServiceError> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(ServiceError::Internal(anyhow::anyhow!("mock delivery failure")));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentEmail {
                to: to_email.to_string(),
                message: message.clone(),
            });
        Ok(())
    }
}
