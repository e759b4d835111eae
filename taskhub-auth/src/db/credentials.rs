use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use std::{collections::HashMap, sync::Mutex};

use super::{is_duplicate_key, lock_poisoned, to_bson, MongoDb};
use crate::models::{OtpChallenge, User};
use crate::services::error::ServiceError;

/// Persistent identities, keyed by id and unique by normalized email.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError>;

    /// Returns `false` when an identity with the same email already exists.
    async fn insert_if_absent(&self, user: &User) -> Result<bool, ServiceError>;

    async fn set_otp(&self, user_id: &str, otp: &OtpChallenge) -> Result<(), ServiceError>;

    /// Stamps `last_login_at` and clears any pending OTP.
    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError>;

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    async fn update_name(&self, user_id: &str, name: &str, at: DateTime<Utc>)
        -> Result<(), ServiceError>;

    /// Disabling also clears any pending OTP.
    async fn set_two_factor(
        &self,
        user_id: &str,
        enabled: bool,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
impl CredentialStore for MongoDb {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "_id": user_id }, None).await?)
    }

    async fn insert_if_absent(&self, user: &User) -> Result<bool, ServiceError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_otp(&self, user_id: &str, otp: &OtpChallenge) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "otp": to_bson(otp)? } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$set": { "last_login_at": BsonDateTime::from_chrono(at) },
                    "$unset": { "otp": "" },
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updated_at": BsonDateTime::from_chrono(at),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn update_name(
        &self,
        user_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "name": name, "updated_at": BsonDateTime::from_chrono(at) } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_two_factor(
        &self,
        user_id: &str,
        enabled: bool,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut update = doc! {
            "$set": {
                "two_factor_enabled": enabled,
                "updated_at": BsonDateTime::from_chrono(at),
            }
        };
        if !enabled {
            update.insert("$unset", doc! { "otp": "" });
        }

        self.users()
            .update_one(doc! { "_id": user_id }, update, None)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryCredentialStore {
    fn update<F>(&self, user_id: &str, apply: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.lock().map_err(lock_poisoned)?;
        if let Some(user) = users.get_mut(user_id) {
            apply(user);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let users = self.users.lock().map_err(lock_poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        let users = self.users.lock().map_err(lock_poisoned)?;
        Ok(users.get(user_id).cloned())
    }

    async fn insert_if_absent(&self, user: &User) -> Result<bool, ServiceError> {
        let mut users = self.users.lock().map_err(lock_poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Ok(false);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    async fn set_otp(&self, user_id: &str, otp: &OtpChallenge) -> Result<(), ServiceError> {
        self.update(user_id, |u| u.otp = Some(otp.clone()))
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.update(user_id, |u| {
            u.last_login_at = Some(at);
            u.otp = None;
        })
    }

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.update(user_id, |u| {
            u.password_hash = password_hash.to_string();
            u.updated_at = at;
        })
    }

    async fn update_name(
        &self,
        user_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.update(user_id, |u| {
            u.name = name.to_string();
            u.updated_at = at;
        })
    }

    async fn set_two_factor(
        &self,
        user_id: &str,
        enabled: bool,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.update(user_id, |u| {
            u.two_factor_enabled = enabled;
            if !enabled {
                u.otp = None;
            }
            u.updated_at = at;
        })
    }
}
