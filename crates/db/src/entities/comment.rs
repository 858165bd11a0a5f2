//! Comment entity - threaded discussion under a post.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Comment entity.
///
/// `parent_id` forms a tree rooted at null. A reply's parent must belong to
/// the same post. Soft-deleted like posts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The post commented on.
    #[sea_orm(indexed)]
    pub post_id: String,

    /// User who authored the comment.
    #[sea_orm(indexed)]
    pub author_id: String,

    /// Comment body.
    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Parent comment for replies; null for top-level comments.
    #[sea_orm(nullable, indexed)]
    pub parent_id: Option<String>,

    /// Soft-delete flag.
    #[sea_orm(default_value = false)]
    pub is_deleted: bool,

    /// When the comment was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the comment was last edited.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
