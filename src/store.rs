//! Persistence seams for linked accounts and state nonces
//!
//! The linking flow depends on these traits only. SeaORM implementations live
//! in [`crate::repositories`]; tests substitute in-memory doubles.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::providers::Platform;

/// Canonical linked account, one per (user_id, platform)
#[derive(Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: String,
    pub platform: Platform,
    pub platform_user_id: String,
    pub platform_user_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by a successful callback
#[derive(Clone, PartialEq, Eq)]
pub struct NewConnection {
    pub user_id: String,
    pub platform: Platform,
    pub platform_user_id: String,
    pub platform_user_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: BTreeSet<String>,
}

fn redacted(token: &Option<String>) -> Option<&'static str> {
    token.as_ref().map(|_| "[REDACTED]")
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field("platform_user_id", &self.platform_user_id)
            .field("platform_user_name", &self.platform_user_name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl fmt::Debug for NewConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewConnection")
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field("platform_user_id", &self.platform_user_id)
            .field("platform_user_name", &self.platform_user_name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("token encryption error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Insert or overwrite the connection for `(user_id, platform)`.
    ///
    /// A relink keeps the row id and `created_at` and replaces everything else.
    async fn upsert(&self, connection: NewConnection) -> Result<Connection, StoreError>;

    async fn find(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Connection>, StoreError>;

    /// All connections of a user ordered by platform
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Connection>, StoreError>;

    /// Returns whether a row was removed
    async fn delete(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait StateNonceStore: Send + Sync {
    /// Record a state nonce as used.
    ///
    /// Returns `Ok(false)` when the nonce was consumed before. `now` must be
    /// the instant the state was validated against.
    async fn consume(
        &self,
        nonce: &str,
        user_id: &str,
        platform: Platform,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
