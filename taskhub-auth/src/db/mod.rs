//! Persistence: one trait per store, each with a MongoDB and an in-memory implementation.

pub mod activity;
pub mod credentials;
pub mod invitations;
pub mod projects;
pub mod verifications;
pub mod workspaces;

pub use activity::{ActivityRecorder, InMemoryActivityRecorder};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use invitations::{InMemoryInvitationLedger, InvitationLedger};
pub use projects::{InMemoryProjectStore, ProjectStore};
pub use verifications::{InMemoryVerificationLedger, VerificationLedger};
pub use workspaces::{InMemoryWorkspaceStore, WorkspaceStore};

use async_trait::async_trait;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::sync::{Arc, PoisonError};

use crate::models::{
    ActivityEntry, Project, User, VerificationEntry, Workspace, WorkspaceInvitation,
};
use crate::services::error::ServiceError;

const DUPLICATE_KEY: i32 = 11000;

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

pub(crate) fn lock_poisoned<T>(_: PoisonError<T>) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("in-memory store lock poisoned"))
}

pub(crate) fn to_bson<T: serde::Serialize>(
    value: &T,
) -> Result<mongodb::bson::Bson, ServiceError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("BSON serialization failed: {}", e)))
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Always healthy; used with the in-memory stores.
pub struct NoopHealthCheck;

#[async_trait]
impl HealthCheck for NoopHealthCheck {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for taskhub-auth");

        create_index(&self.users(), doc! { "email": 1 }, "email_unique_idx", true).await?;

        // One live entry per (user, purpose); expired entries are removed before insert.
        create_index(
            &self.verifications(),
            doc! { "user_id": 1, "purpose": 1 },
            "user_purpose_unique_idx",
            true,
        )
        .await?;

        create_index(
            &self.invitations(),
            doc! { "user_id": 1, "workspace_id": 1 },
            "user_workspace_unique_idx",
            true,
        )
        .await?;
        create_index(
            &self.invitations(),
            doc! { "workspace_id": 1 },
            "workspace_idx",
            false,
        )
        .await?;

        create_index(
            &self.projects(),
            doc! { "workspace_id": 1 },
            "workspace_idx",
            false,
        )
        .await?;

        create_index(
            &self.activity_logs(),
            doc! { "resource_id": 1, "created_at": -1 },
            "resource_created_idx",
            false,
        )
        .await?;

        tracing::info!("MongoDB indexes created successfully");
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn verifications(&self) -> Collection<VerificationEntry> {
        self.db.collection("verifications")
    }

    pub fn invitations(&self) -> Collection<WorkspaceInvitation> {
        self.db.collection("workspace_invites")
    }

    pub fn workspaces(&self) -> Collection<Workspace> {
        self.db.collection("workspaces")
    }

    pub fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    pub fn activity_logs(&self) -> Collection<ActivityEntry> {
        self.db.collection("activity_logs")
    }
}

async fn create_index<T>(
    collection: &Collection<T>,
    keys: Document,
    name: &str,
    unique: bool,
) -> Result<(), AppError> {
    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!(index = %name, collection = %collection.name(), "Failed to create index: {}", e);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;

    Ok(())
}

#[async_trait]
impl HealthCheck for MongoDb {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}

/// Every store the service needs, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub verifications: Arc<dyn VerificationLedger>,
    pub invitations: Arc<dyn InvitationLedger>,
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub activity: Arc<dyn ActivityRecorder>,
    pub health: Arc<dyn HealthCheck>,
}

impl Stores {
    pub fn mongo(db: MongoDb) -> Self {
        let db = Arc::new(db);
        Self {
            credentials: db.clone(),
            verifications: db.clone(),
            invitations: db.clone(),
            workspaces: db.clone(),
            projects: db.clone(),
            activity: db.clone(),
            health: db,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::default()),
            verifications: Arc::new(InMemoryVerificationLedger::default()),
            invitations: Arc::new(InMemoryInvitationLedger::default()),
            workspaces: Arc::new(InMemoryWorkspaceStore::default()),
            projects: Arc::new(InMemoryProjectStore::default()),
            activity: Arc::new(InMemoryActivityRecorder::default()),
            health: Arc::new(NoopHealthCheck),
        }
    }
}
