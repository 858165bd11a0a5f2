//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post entity - content submitted to a community.
///
/// Posts are soft-deleted: `is_deleted` hides a post from listings while
/// keeping the row so comments, votes, and images stay referentially intact
/// and the post can be restored.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Community the post belongs to.
    #[sea_orm(indexed)]
    pub community_id: String,

    /// User who authored the post.
    #[sea_orm(indexed)]
    pub author_id: String,

    /// Post title.
    pub title: String,

    /// Post body.
    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Legacy single image URL (first of the attached images).
    #[sea_orm(nullable)]
    pub image_url: Option<String>,

    /// Pinned posts sort before everything else in listings.
    #[sea_orm(default_value = false)]
    pub is_pinned: bool,

    /// Locked posts accept no new comments.
    #[sea_orm(default_value = false)]
    pub is_locked: bool,

    /// Soft-delete flag.
    #[sea_orm(default_value = false)]
    pub is_deleted: bool,

    /// When the post was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the post was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::community::Entity",
        from = "Column::CommunityId",
        to = "super::community::Column::Id",
        on_delete = "Cascade"
    )]
    Community,
    #[sea_orm(has_many = "super::post_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::post_vote::Entity")]
    Votes,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::community::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Community.def()
    }
}

impl Related<super::post_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::post_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
