//! Migration to create the social_connections table.
//!
//! One row per linked account; the unique index on (user_id, platform) is what
//! makes relinking an upsert instead of a second row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SocialConnections::UserId).text().not_null())
                    .col(ColumnDef::new(SocialConnections::Platform).text().not_null())
                    .col(
                        ColumnDef::new(SocialConnections::PlatformUserId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialConnections::PlatformUserName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialConnections::AccessTokenCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialConnections::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialConnections::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SocialConnections::Scopes).json().not_null())
                    .col(
                        ColumnDef::new(SocialConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SocialConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_social_connections_user_platform")
                    .table(SocialConnections::Table)
                    .col(SocialConnections::UserId)
                    .col(SocialConnections::Platform)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_social_connections_user_platform")
                    .table(SocialConnections::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SocialConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SocialConnections {
    Table,
    Id,
    UserId,
    Platform,
    PlatformUserId,
    PlatformUserName,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    Scopes,
    CreatedAt,
    UpdatedAt,
}
