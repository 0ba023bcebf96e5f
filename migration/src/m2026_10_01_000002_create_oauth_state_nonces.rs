//! Migration to create the oauth_state_nonces ledger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuthStateNonces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuthStateNonces::NonceHash)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuthStateNonces::UserId).text().not_null())
                    .col(ColumnDef::new(OAuthStateNonces::Platform).text().not_null())
                    .col(
                        ColumnDef::new(OAuthStateNonces::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuthStateNonces::ConsumedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Purge scans by expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_state_nonces_expires_at")
                    .table(OAuthStateNonces::Table)
                    .col(OAuthStateNonces::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuthStateNonces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OAuthStateNonces {
    #[sea_orm(iden = "oauth_state_nonces")]
    Table,
    NonceHash,
    UserId,
    Platform,
    ExpiresAt,
    ConsumedAt,
}
