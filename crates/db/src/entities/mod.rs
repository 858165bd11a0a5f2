//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod community;
pub mod membership;
pub mod post;
pub mod post_image;
pub mod post_vote;

pub use comment::Entity as Comment;
pub use community::Entity as Community;
pub use membership::Entity as Membership;
pub use post::Entity as Post;
pub use post_image::Entity as PostImage;
pub use post_vote::Entity as PostVote;
