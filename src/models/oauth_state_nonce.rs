//! # OAuth State Nonce Model
//!
//! Ledger of consumed authorization-state nonces. A row's existence means the
//! state carrying that nonce can no longer be redeemed.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_state_nonces")]
pub struct Model {
    /// SHA-256 of the nonce, base64url encoded
    #[sea_orm(primary_key, auto_increment = false)]
    pub nonce_hash: String,

    pub user_id: String,

    pub platform: String,

    /// When the state itself expires; rows past this are purgeable
    pub expires_at: DateTimeWithTimeZone,

    pub consumed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
