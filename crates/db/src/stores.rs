use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{
    NewUser, PullRequestAttrs, PullRequestRow, RepositoryAttrs, RepositoryRow, ReviewAttrs,
    ReviewRow, UserProfile, UserRow,
};

/// Persistence collaborator contract. Every entity type is keyed by its
/// immutable external id; `create`/`update` enforce field-level constraints
/// and surface violations as `DbError::Constraint`.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<RepositoryRow>>;
    async fn create(&self, github_id: &str, attrs: RepositoryAttrs) -> Result<RepositoryRow>;
    async fn update(&self, id: i64, attrs: RepositoryAttrs) -> Result<RepositoryRow>;
    async fn list(&self, limit: i64) -> Result<Vec<RepositoryRow>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<UserRow>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRow>>;
    async fn create(&self, user: NewUser) -> Result<UserRow>;
    /// Refresh the login of a known user without touching profile fields.
    async fn update_login(&self, id: i64, login: &str) -> Result<UserRow>;
    /// Apply the full profile attribute set from an enrichment fetch.
    async fn update_profile(&self, id: i64, profile: UserProfile) -> Result<UserRow>;
    async fn list(&self, limit: i64) -> Result<Vec<UserRow>>;
}

#[async_trait]
pub trait PullRequestStore: Send + Sync {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<PullRequestRow>>;
    async fn create(&self, github_id: &str, attrs: PullRequestAttrs) -> Result<PullRequestRow>;
    async fn update(&self, id: i64, attrs: PullRequestAttrs) -> Result<PullRequestRow>;
    async fn list_by_repository(
        &self,
        repository_id: i64,
        limit: i64,
    ) -> Result<Vec<PullRequestRow>>;
    async fn count_by_repository(&self, repository_id: i64) -> Result<i64>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<ReviewRow>>;
    async fn create(&self, github_id: &str, attrs: ReviewAttrs) -> Result<ReviewRow>;
    async fn update(&self, id: i64, attrs: ReviewAttrs) -> Result<ReviewRow>;
}

pub trait Stores: Send + Sync {
    fn repositories(&self) -> &dyn RepositoryStore;
    fn users(&self) -> &dyn UserStore;
    fn pull_requests(&self) -> &dyn PullRequestStore;
    fn reviews(&self) -> &dyn ReviewStore;
}
