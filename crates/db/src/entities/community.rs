//! Community entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Community visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone can join and becomes a member immediately.
    #[sea_orm(string_value = "public")]
    Public,
    /// Join requests start as pending and need moderator approval.
    #[sea_orm(string_value = "restricted")]
    Restricted,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

/// Community entity - a named space users join to post and discuss.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "community")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// URL-safe identifier, unique and immutable after creation.
    #[sea_orm(unique, indexed)]
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Community description.
    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Who may join without approval.
    pub visibility: Visibility,

    /// Icon image URL (optional).
    #[sea_orm(nullable)]
    pub icon_url: Option<String>,

    /// Banner image URL (optional).
    #[sea_orm(nullable)]
    pub banner_url: Option<String>,

    /// User who created the community.
    #[sea_orm(indexed)]
    pub created_by: String,

    /// When the community was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the community was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
