//! Membership entity - who belongs to which community, and with what role.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a community member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Owner - full control; every community keeps at least one.
    #[sea_orm(string_value = "owner")]
    Owner,
    /// Moderator - can pin/lock posts and manage join requests.
    #[sea_orm(string_value = "moderator")]
    Moderator,
    /// Regular member.
    #[sea_orm(string_value = "member")]
    Member,
    /// Join request awaiting approval; carries no member rights.
    #[sea_orm(string_value = "pending")]
    Pending,
}

impl Default for MembershipRole {
    fn default() -> Self {
        Self::Member
    }
}

impl MembershipRole {
    /// Check if the role has moderation capabilities.
    #[must_use]
    pub const fn can_moderate(self) -> bool {
        matches!(self, Self::Moderator | Self::Owner)
    }

    /// Check if this is the owner role.
    #[must_use]
    pub const fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Check if the role carries posting and commenting rights.
    /// Pending requests do not.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Member | Self::Moderator | Self::Owner)
    }
}

/// Membership - at most one row per `(community, user)` pair.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "membership")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The community joined.
    #[sea_orm(indexed)]
    pub community_id: String,

    /// The user who joined.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Role within the community.
    pub role: MembershipRole,

    /// When the membership (or join request) was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the role was last changed.
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
}

impl Related<super::community::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Community.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
