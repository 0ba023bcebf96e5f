//! # OAuth State Nonce Repository
//!
//! Single-use ledger for authorization-state nonces. The primary key on the
//! nonce hash turns a second redemption into a unique violation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::oauth_state_nonce::{self, Entity as OAuthStateNonce};
use crate::providers::Platform;
use crate::store::{StateNonceStore, StoreError};

/// Repository for consumed state nonces
#[derive(Debug, Clone)]
pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Drop ledger rows whose states can no longer be presented
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff: DateTimeWithTimeZone = now.into();
        let result = OAuthStateNonce::delete_many()
            .filter(oauth_state_nonce::Column::ExpiresAt.lt(cutoff))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn hash_nonce(nonce: &str) -> String {
    base64_url::encode(&Sha256::digest(nonce.as_bytes()))
}

#[async_trait]
impl StateNonceStore for OAuthStateRepository {
    async fn consume(
        &self,
        nonce: &str,
        user_id: &str,
        platform: Platform,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let purged = self.purge_expired(now).await?;
        if purged > 0 {
            debug!(purged, "Purged expired state nonces");
        }

        let row = oauth_state_nonce::ActiveModel {
            nonce_hash: Set(hash_nonce(nonce)),
            user_id: Set(user_id.to_string()),
            platform: Set(platform.to_string()),
            expires_at: Set(expires_at.into()),
            consumed_at: Set(now.into()),
        };

        match OAuthStateNonce::insert(row)
            .exec_without_returning(&*self.db)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}
