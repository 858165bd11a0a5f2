//! Create `post_vote` table.
//!
//! The unique index on `(post_id, user_id)` serializes concurrent votes from
//! the same user; score is always computed as `SUM(value)`, never stored.

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
                    .table(PostVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostVote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostVote::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(PostVote::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(PostVote::Value).small_integer().not_null())
                    .col(
                        ColumnDef::new(PostVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PostVote::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_vote_post")
                            .from(PostVote::Table, PostVote::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_vote_post_user")
                    .table(PostVote::Table)
                    .col(PostVote::PostId)
                    .col(PostVote::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_vote_user_id")
                    .table(PostVote::Table)
                    .col(PostVote::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostVote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PostVote {
    Table,
    Id,
    PostId,
    UserId,
    Value,
    CreatedAt,
    UpdatedAt,
}
