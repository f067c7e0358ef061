pub mod models;
pub mod payloads;
pub mod transform;

pub use models::{
    NormalizedPullRequest, NormalizedRepository, NormalizedReview, NormalizedUser, ReviewState,
};
pub use payloads::{PullRequestPayload, RepoPayload, ReviewPayload, UserPayload, UserRef};
pub use transform::{
    normalize_pull_request, normalize_repo, normalize_review, normalize_user, NormalizeError,
};
