//! Connection entity model
//!
//! SeaORM entity for the `social_connections` table, which stores one linked
//! social account per user and platform.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Linked social account; tokens are stored encrypted
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_connections")]
pub struct Model {
    /// Stable identifier that survives relinks
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Session-service subject that owns the link
    pub user_id: String,

    /// Platform identifier (`linkedin`, `twitter`, ...)
    pub platform: String,

    pub platform_user_id: String,

    pub platform_user_name: String,

    /// AES-GCM ciphertext bound to (user_id, platform, "access_token")
    pub access_token_ciphertext: Vec<u8>,

    /// AES-GCM ciphertext bound to (user_id, platform, "refresh_token")
    pub refresh_token_ciphertext: Option<Vec<u8>>,

    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Granted scopes as a sorted JSON array
    #[sea_orm(column_type = "Json")]
    pub scopes: JsonValue,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
