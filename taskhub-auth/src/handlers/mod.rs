//! HTTP handlers for taskhub-auth.

pub mod auth;
pub mod metrics;
pub mod project;
pub mod user;
pub mod workspace;
