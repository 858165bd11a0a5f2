//! Post vote entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post vote - at most one row per `(post, user)`.
///
/// `value` is -1 or +1. "No vote" is the absence of a row, never a stored
/// zero; a post's score is the sum of its vote rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post_vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The post voted on.
    #[sea_orm(indexed)]
    pub post_id: String,

    /// The user who voted.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Vote value: -1 (down) or +1 (up).
    pub value: i16,

    /// When the vote was first cast.
    pub created_at: DateTimeWithTimeZone,

    /// When the vote last flipped direction.
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
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
