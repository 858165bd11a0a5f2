//! Create `post_image` table.

use sea_orm_migration::prelude::*;

use super::m20250101_000003_create_post_table::Post;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostImage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostImage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostImage::PostId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PostImage::ImageUrl)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostImage::Position)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_image_post")
                            .from(PostImage::Table, PostImage::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_image_post_position")
                    .table(PostImage::Table)
                    .col(PostImage::PostId)
                    .col(PostImage::Position)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostImage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PostImage {
    Table,
    Id,
    PostId,
    ImageUrl,
    Position,
}
