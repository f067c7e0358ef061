use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::time::{sleep, Duration};
use tracing::{instrument, warn};

use crate::errors::{DbError, Result};
use crate::models::{
    NewUser, PullRequestAttrs, PullRequestRow, RepositoryAttrs, RepositoryRow, ReviewAttrs,
    ReviewRow, UserProfile, UserRow,
};
use crate::stores::{PullRequestStore, RepositoryStore, ReviewStore, Stores, UserStore};

const REPOSITORY_COLUMNS: &str = "id, github_id, name, url, is_private, is_archived";
const USER_COLUMNS: &str = "id, github_id, login, name, email, bio, company, location, blog, \
     twitter_username, public_repos, public_gists, followers, following, github_created_at, \
     github_updated_at";
const PULL_REQUEST_COLUMNS: &str = "id, github_id, repository_id, author_id, number, title, \
     closed_at, merged_at, additions, deletions, changed_files, commit_count";
const REVIEW_COLUMNS: &str = "id, github_id, pull_request_id, reviewer_id, state, submitted_at";

fn map_query_err(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::RowNotFound => DbError::NotFound,
        other => DbError::Query(other),
    }
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    repository_store: Arc<PgRepositoryStore>,
    user_store: Arc<PgUserStore>,
    pull_request_store: Arc<PgPullRequestStore>,
    review_store: Arc<PgReviewStore>,
}

impl PgDatabase {
    pub async fn connect(database_url: &str) -> Result<Self> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 500;

        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
            {
                Ok(pool) => return Ok(Self::from_pool(pool)),
                Err(err) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(DbError::Query(err));
                    }

                    let exp = (attempts - 1).min(5);
                    let backoff = Duration::from_millis(BASE_DELAY_MS * (1u64 << exp));
                    warn!(
                        attempts,
                        error = %err,
                        wait_ms = backoff.as_millis(),
                        "database connection failed; retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let repository_store = Arc::new(PgRepositoryStore { pool: pool.clone() });
        let user_store = Arc::new(PgUserStore { pool: pool.clone() });
        let pull_request_store = Arc::new(PgPullRequestStore { pool: pool.clone() });
        let review_store = Arc::new(PgReviewStore { pool: pool.clone() });

        Self {
            pool,
            repository_store,
            user_store,
            pull_request_store,
            review_store,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Stores for PgDatabase {
    fn repositories(&self) -> &dyn RepositoryStore {
        &*self.repository_store
    }

    fn users(&self) -> &dyn UserStore {
        &*self.user_store
    }

    fn pull_requests(&self) -> &dyn PullRequestStore {
        &*self.pull_request_store
    }

    fn reviews(&self) -> &dyn ReviewStore {
        &*self.review_store
    }
}

#[derive(Clone)]
struct PgRepositoryStore {
    pool: PgPool,
}

#[async_trait]
impl RepositoryStore for PgRepositoryStore {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<RepositoryRow>> {
        sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE github_id = $1"
        ))
        .bind(github_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_err)
    }

    #[instrument(skip(self, attrs), fields(name = %attrs.name))]
    async fn create(&self, github_id: &str, attrs: RepositoryAttrs) -> Result<RepositoryRow> {
        attrs.validate()?;
        sqlx::query_as::<_, RepositoryRow>(&format!(
            "INSERT INTO repositories (github_id, name, url, is_private, is_archived)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REPOSITORY_COLUMNS}"
        ))
        .bind(github_id)
        .bind(attrs.name)
        .bind(attrs.url)
        .bind(attrs.is_private)
        .bind(attrs.is_archived)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn update(&self, id: i64, attrs: RepositoryAttrs) -> Result<RepositoryRow> {
        attrs.validate()?;
        sqlx::query_as::<_, RepositoryRow>(&format!(
            "UPDATE repositories
             SET name = $1, url = $2, is_private = $3, is_archived = $4
             WHERE id = $5
             RETURNING {REPOSITORY_COLUMNS}"
        ))
        .bind(attrs.name)
        .bind(attrs.url)
        .bind(attrs.is_private)
        .bind(attrs.is_archived)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn list(&self, limit: i64) -> Result<Vec<RepositoryRow>> {
        sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY name LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_err)
    }
}

#[derive(Clone)]
struct PgUserStore {
    pool: PgPool,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE github_id = $1"
        ))
        .bind(github_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login = $1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_err)
    }

    #[instrument(skip(self, user), fields(login = %user.login))]
    async fn create(&self, user: NewUser) -> Result<UserRow> {
        user.validate()?;
        sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (github_id, login) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.github_id)
        .bind(user.login)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn update_login(&self, id: i64, login: &str) -> Result<UserRow> {
        if login.trim().is_empty() {
            return Err(DbError::constraint("user login must be present"));
        }
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET login = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(login)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn update_profile(&self, id: i64, profile: UserProfile) -> Result<UserRow> {
        profile.validate()?;
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users
             SET login = $1, name = $2, email = $3, bio = $4, company = $5, location = $6,
                 blog = $7, twitter_username = $8, public_repos = $9, public_gists = $10,
                 followers = $11, following = $12, github_created_at = $13,
                 github_updated_at = $14
             WHERE id = $15
             RETURNING {USER_COLUMNS}"
        ))
        .bind(profile.login)
        .bind(profile.name)
        .bind(profile.email)
        .bind(profile.bio)
        .bind(profile.company)
        .bind(profile.location)
        .bind(profile.blog)
        .bind(profile.twitter_username)
        .bind(profile.public_repos)
        .bind(profile.public_gists)
        .bind(profile.followers)
        .bind(profile.following)
        .bind(profile.github_created_at)
        .bind(profile.github_updated_at)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn list(&self, limit: i64) -> Result<Vec<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY login LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_err)
    }
}

#[derive(Clone)]
struct PgPullRequestStore {
    pool: PgPool,
}

#[async_trait]
impl PullRequestStore for PgPullRequestStore {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<PullRequestRow>> {
        sqlx::query_as::<_, PullRequestRow>(&format!(
            "SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests WHERE github_id = $1"
        ))
        .bind(github_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_err)
    }

    #[instrument(skip(self, attrs), fields(number = attrs.number))]
    async fn create(&self, github_id: &str, attrs: PullRequestAttrs) -> Result<PullRequestRow> {
        attrs.validate()?;
        sqlx::query_as::<_, PullRequestRow>(&format!(
            "INSERT INTO pull_requests (
                 github_id, repository_id, author_id, number, title, closed_at, merged_at,
                 additions, deletions, changed_files, commit_count
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {PULL_REQUEST_COLUMNS}"
        ))
        .bind(github_id)
        .bind(attrs.repository_id)
        .bind(attrs.author_id)
        .bind(attrs.number)
        .bind(attrs.title)
        .bind(attrs.closed_at)
        .bind(attrs.merged_at)
        .bind(attrs.additions)
        .bind(attrs.deletions)
        .bind(attrs.changed_files)
        .bind(attrs.commit_count)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn update(&self, id: i64, attrs: PullRequestAttrs) -> Result<PullRequestRow> {
        attrs.validate()?;
        sqlx::query_as::<_, PullRequestRow>(&format!(
            "UPDATE pull_requests
             SET repository_id = $1, author_id = $2, number = $3, title = $4, closed_at = $5,
                 merged_at = $6, additions = $7, deletions = $8, changed_files = $9,
                 commit_count = $10
             WHERE id = $11
             RETURNING {PULL_REQUEST_COLUMNS}"
        ))
        .bind(attrs.repository_id)
        .bind(attrs.author_id)
        .bind(attrs.number)
        .bind(attrs.title)
        .bind(attrs.closed_at)
        .bind(attrs.merged_at)
        .bind(attrs.additions)
        .bind(attrs.deletions)
        .bind(attrs.changed_files)
        .bind(attrs.commit_count)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn list_by_repository(
        &self,
        repository_id: i64,
        limit: i64,
    ) -> Result<Vec<PullRequestRow>> {
        sqlx::query_as::<_, PullRequestRow>(&format!(
            "SELECT {PULL_REQUEST_COLUMNS}
             FROM pull_requests
             WHERE repository_id = $1
             ORDER BY number
             LIMIT $2"
        ))
        .bind(repository_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn count_by_repository(&self, repository_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pull_requests WHERE repository_id = $1",
        )
        .bind(repository_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }
}

#[derive(Clone)]
struct PgReviewStore {
    pool: PgPool,
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<ReviewRow>> {
        sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE github_id = $1"
        ))
        .bind(github_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn create(&self, github_id: &str, attrs: ReviewAttrs) -> Result<ReviewRow> {
        attrs.validate()?;
        sqlx::query_as::<_, ReviewRow>(&format!(
            "INSERT INTO reviews (github_id, pull_request_id, reviewer_id, state, submitted_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(github_id)
        .bind(attrs.pull_request_id)
        .bind(attrs.reviewer_id)
        .bind(attrs.state)
        .bind(attrs.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }

    async fn update(&self, id: i64, attrs: ReviewAttrs) -> Result<ReviewRow> {
        attrs.validate()?;
        sqlx::query_as::<_, ReviewRow>(&format!(
            "UPDATE reviews
             SET pull_request_id = $1, reviewer_id = $2, state = $3, submitted_at = $4
             WHERE id = $5
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(attrs.pull_request_id)
        .bind(attrs.reviewer_id)
        .bind(attrs.state)
        .bind(attrs.submitted_at)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_err)
    }
}
