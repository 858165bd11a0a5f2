//! Business logic services.

pub mod comment;
pub mod community;
pub mod feed;
pub mod media;
pub mod membership;
pub mod post;
pub mod vote;

pub use comment::{CommentResponse, CommentService, CreateCommentInput, UpdateCommentInput};
pub use community::{
    CommunityResponse, CommunityService, CreateCommunityInput, ListCommunitiesQuery,
    UpdateCommunityInput, slugify,
};
pub use feed::{FeedQuery, FeedService};
pub use media::{MediaService, UploadInput, UploadResponse};
pub use membership::{JoinOutcome, MemberResponse, MembershipService};
pub use post::{
    CreatePostInput, PostImageResponse, PostResponse, PostService, UpdatePostInput,
};
pub use vote::{CastVoteInput, VoteResponse, VoteService};
