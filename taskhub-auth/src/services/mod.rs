//! Services layer for taskhub-auth.
//!
//! Identity flows, access control and the collaborators they compose.

pub mod access;
mod account;
mod auth;
pub mod clock;
mod email;
pub mod error;
pub mod metrics;
mod project;
mod session;
pub mod tokens;
mod workspace;

pub use access::{AccessEvaluator, ProjectAction, WorkspaceAction};
pub use account::AccountService;
pub use auth::AuthService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{
    EmailMessage, EmailProvider, LogEmailService, MockEmailService, SentEmail, SmtpEmailService,
};
pub use error::ServiceError;
pub use project::ProjectService;
pub use session::{SessionGrant, SessionIssuer};
pub use tokens::TokenService;
pub use workspace::WorkspaceService;
