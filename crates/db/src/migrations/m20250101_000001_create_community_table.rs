//! Create community table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Community::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Community::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Community::Slug)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Community::Name).string_len(120).not_null())
                    .col(
                        ColumnDef::new(Community::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Community::Visibility)
                            .string_len(12)
                            .not_null()
                            .default("public"),
                    )
                    .col(ColumnDef::new(Community::IconUrl).string_len(500))
                    .col(ColumnDef::new(Community::BannerUrl).string_len(500))
                    .col(
                        ColumnDef::new(Community::CreatedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Community::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Community::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_community_slug")
                    .table(Community::Table)
                    .col(Community::Slug)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_community_visibility")
                    .table(Community::Table)
                    .col(Community::Visibility)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_community_created_at")
                    .table(Community::Table)
                    .col(Community::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Community::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Community {
    Table,
    Id,
    Slug,
    Name,
    Description,
    Visibility,
    IconUrl,
    BannerUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
