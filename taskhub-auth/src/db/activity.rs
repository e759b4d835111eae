use async_trait::async_trait;
use std::sync::Mutex;

use super::{lock_poisoned, MongoDb};
use crate::models::ActivityEntry;
use crate::services::error::ServiceError;

#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ServiceError>;

    /// Audit writes never fail the operation that triggered them.
    async fn record_best_effort(&self, entry: &ActivityEntry) {
        if let Err(e) = self.record(entry).await {
            tracing::error!(
                error = %e,
                action = ?entry.action,
                resource_id = %entry.resource_id,
                "Failed to record activity"
            );
        }
    }
}

#[async_trait]
impl ActivityRecorder for MongoDb {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ServiceError> {
        self.activity_logs().insert_one(entry, None).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryActivityRecorder {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl InMemoryActivityRecorder {
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityRecorder for InMemoryActivityRecorder {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ServiceError> {
        self.entries
            .lock()
            .map_err(lock_poisoned)?
            .push(entry.clone());
        Ok(())
    }
}
