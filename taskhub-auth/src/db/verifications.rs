use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use std::{collections::HashMap, sync::Mutex};

use super::{is_duplicate_key, lock_poisoned, MongoDb};
use crate::models::{VerificationEntry, VerificationPurpose};
use crate::services::error::ServiceError;

/// Single-use token ledger: at most one live entry per (user, purpose).
#[async_trait]
pub trait VerificationLedger: Send + Sync {
    /// Stores `entry` unless a live entry for the same (user, purpose) exists.
    /// An expired entry is discarded first. Returns `false` when a live entry blocks the insert.
    async fn insert_if_vacant(
        &self,
        entry: &VerificationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn find(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<VerificationEntry>, ServiceError>;

    /// Removes and returns the entry matching all three keys, if any.
    async fn take(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationEntry>, ServiceError>;
}

#[async_trait]
impl VerificationLedger for MongoDb {
    async fn insert_if_vacant(
        &self,
        entry: &VerificationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        self.verifications()
            .delete_one(
                doc! {
                    "user_id": entry.user_id.as_str(),
                    "purpose": entry.purpose.as_str(),
                    "expires_at": { "$lte": BsonDateTime::from_chrono(now) },
                },
                None,
            )
            .await?;

        match self.verifications().insert_one(entry, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<VerificationEntry>, ServiceError> {
        Ok(self
            .verifications()
            .find_one(doc! { "user_id": user_id, "purpose": purpose.as_str() }, None)
            .await?)
    }

    async fn take(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationEntry>, ServiceError> {
        Ok(self
            .verifications()
            .find_one_and_delete(
                doc! {
                    "user_id": user_id,
                    "purpose": purpose.as_str(),
                    "token_hash": token_hash,
                },
                None,
            )
            .await?)
    }
}

#[derive(Default)]
pub struct InMemoryVerificationLedger {
    entries: Mutex<HashMap<(String, VerificationPurpose), VerificationEntry>>,
}

#[async_trait]
impl VerificationLedger for InMemoryVerificationLedger {
    async fn insert_if_vacant(
        &self,
        entry: &VerificationEntry,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        let key = (entry.user_id.clone(), entry.purpose);

        if entries.get(&key).is_some_and(|existing| !existing.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(key, entry.clone());
        Ok(true)
    }

    async fn find(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<VerificationEntry>, ServiceError> {
        let entries = self.entries.lock().map_err(lock_poisoned)?;
        Ok(entries.get(&(user_id.to_string(), purpose)).cloned())
    }

    async fn take(
        &self,
        user_id: &str,
        purpose: VerificationPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationEntry>, ServiceError> {
        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        let key = (user_id.to_string(), purpose);

        let matches = entries
            .get(&key)
            .is_some_and(|entry| entry.token_hash == token_hash);
        Ok(if matches { entries.remove(&key) } else { None })
    }
}
