//! Repository layer.
//!
//! Data access for the application, one repository per aggregate.

mod comment;
mod community;
mod membership;
mod post;
mod post_vote;

pub use comment::{CommentFilter, CommentRepository};
pub use community::{CommunityOrdering, CommunityRepository, CommunityWithCounts};
pub use membership::{ACTIVE_ROLES, MembershipRepository};
pub use post::{AnnotatedPost, PostFilter, PostOrdering, PostRepository};
pub use post_vote::{PostVoteRepository, VoteOutcome};
