//! Connection repository for database operations
//!
//! SeaORM-backed [`ConnectionStore`]. Tokens are encrypted before they reach
//! the database and decrypted on the way out; the unique index on
//! `(user_id, platform)` makes every write an idempotent upsert.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::crypto::{CryptoKey, TokenField, decrypt_token, encrypt_token};
use crate::models::connection::{self, Entity as SocialConnection};
use crate::providers::Platform;
use crate::store::{Connection, ConnectionStore, NewConnection, StoreError};

/// Repository for connection database operations
#[derive(Debug, Clone)]
pub struct ConnectionRepository {
    db: Arc<DatabaseConnection>,
    crypto_key: CryptoKey,
}

impl ConnectionRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    fn to_domain(&self, model: connection::Model) -> Result<Connection, StoreError> {
        let platform: Platform = model
            .platform
            .parse()
            .map_err(|e: crate::providers::UnknownPlatform| StoreError::Corrupt(e.to_string()))?;

        let access_token = decrypt_token(
            &self.crypto_key,
            &model.user_id,
            platform,
            TokenField::Access,
            &model.access_token_ciphertext,
        )?;
        let refresh_token = model
            .refresh_token_ciphertext
            .as_deref()
            .map(|ciphertext| {
                decrypt_token(
                    &self.crypto_key,
                    &model.user_id,
                    platform,
                    TokenField::Refresh,
                    ciphertext,
                )
            })
            .transpose()?;
        let scopes: BTreeSet<String> = serde_json::from_value(model.scopes)
            .map_err(|e| StoreError::Corrupt(format!("scopes: {}", e)))?;

        Ok(Connection {
            id: model.id,
            user_id: model.user_id,
            platform,
            platform_user_id: model.platform_user_id,
            platform_user_name: model.platform_user_name,
            access_token,
            refresh_token,
            expires_at: model.expires_at.map(|at| at.with_timezone(&Utc)),
            scopes,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl ConnectionStore for ConnectionRepository {
    async fn upsert(&self, new: NewConnection) -> Result<Connection, StoreError> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        let access_token_ciphertext = encrypt_token(
            &self.crypto_key,
            &new.user_id,
            new.platform,
            TokenField::Access,
            &new.access_token,
        )?;
        let refresh_token_ciphertext = new
            .refresh_token
            .as_deref()
            .map(|token| {
                encrypt_token(
                    &self.crypto_key,
                    &new.user_id,
                    new.platform,
                    TokenField::Refresh,
                    token,
                )
            })
            .transpose()?;
        // BTreeSet iteration is sorted, so the stored array is canonical
        let scopes = JsonValue::Array(
            new.scopes
                .iter()
                .map(|scope| JsonValue::String(scope.clone()))
                .collect(),
        );

        let row = connection::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id.clone()),
            platform: Set(new.platform.to_string()),
            platform_user_id: Set(new.platform_user_id.clone()),
            platform_user_name: Set(new.platform_user_name.clone()),
            access_token_ciphertext: Set(access_token_ciphertext),
            refresh_token_ciphertext: Set(refresh_token_ciphertext),
            expires_at: Set(new.expires_at.map(Into::into)),
            scopes: Set(scopes),
            created_at: Set(now),
            updated_at: Set(now),
        };

        SocialConnection::insert(row)
            .on_conflict(
                OnConflict::columns([connection::Column::UserId, connection::Column::Platform])
                    .update_columns([
                        connection::Column::PlatformUserId,
                        connection::Column::PlatformUserName,
                        connection::Column::AccessTokenCiphertext,
                        connection::Column::RefreshTokenCiphertext,
                        connection::Column::ExpiresAt,
                        connection::Column::Scopes,
                        connection::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        self.find(&new.user_id, new.platform)
            .await?
            .ok_or_else(|| StoreError::Corrupt("upserted connection not found".to_string()))
    }

    async fn find(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Connection>, StoreError> {
        SocialConnection::find()
            .filter(connection::Column::UserId.eq(user_id))
            .filter(connection::Column::Platform.eq(platform.as_str()))
            .one(&*self.db)
            .await?
            .map(|model| self.to_domain(model))
            .transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Connection>, StoreError> {
        SocialConnection::find()
            .filter(connection::Column::UserId.eq(user_id))
            .order_by_asc(connection::Column::Platform)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|model| self.to_domain(model))
            .collect()
    }

    async fn delete(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError> {
        let result = SocialConnection::delete_many()
            .filter(connection::Column::UserId.eq(user_id))
            .filter(connection::Column::Platform.eq(platform.as_str()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
