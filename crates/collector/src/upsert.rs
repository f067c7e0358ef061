//! Create-if-absent-else-update, keyed by external id. Skips are explicit
//! values handed back to the caller; only infrastructure failures propagate.

use std::fmt;

use db::models::{NewUser, PullRequestAttrs, RepositoryAttrs, ReviewAttrs, UserProfile, UserRow};
use db::{DbError, Stores};
use normalizer::models::{
    NormalizedPullRequest, NormalizedRepository, NormalizedReview, NormalizedUser,
};
use normalizer::payloads::UserRef;
use tracing::{debug, warn};

use crate::metrics;

#[derive(Debug)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped(SkipReason),
}

impl UpsertOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, UpsertOutcome::Created | UpsertOutcome::Updated)
    }
}

#[derive(Debug)]
pub enum SkipReason {
    /// The record references a repository that was never ingested.
    UnknownRepository { github_id: String },
    /// The store rejected the record on a field-level constraint.
    Constraint(String),
}

impl SkipReason {
    fn label(&self) -> &'static str {
        match self {
            SkipReason::UnknownRepository { .. } => "unknown_repository",
            SkipReason::Constraint(_) => "constraint",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownRepository { github_id } => {
                write!(f, "repository {github_id} not ingested")
            }
            SkipReason::Constraint(message) => write!(f, "{message}"),
        }
    }
}

/// Collapse a constraint rejection into a per-record skip; anything else is
/// an infrastructure failure the caller must see.
fn absorb_constraint(
    entity: &'static str,
    github_id: &str,
    result: Result<UpsertOutcome, DbError>,
) -> Result<UpsertOutcome, DbError> {
    match result {
        Err(DbError::Constraint(message)) => {
            warn!(entity, github_id, %message, "record rejected by store constraint");
            let reason = SkipReason::Constraint(message);
            metrics::RECORDS_SKIPPED_TOTAL
                .with_label_values(&[entity, reason.label()])
                .inc();
            Ok(UpsertOutcome::Skipped(reason))
        }
        other => other,
    }
}

pub async fn upsert_repository(
    stores: &dyn Stores,
    record: &NormalizedRepository,
) -> Result<UpsertOutcome, DbError> {
    let attrs = RepositoryAttrs {
        name: record.name.clone(),
        url: record.url.clone(),
        is_private: record.is_private,
        is_archived: record.is_archived,
    };

    let store = stores.repositories();
    let result = match store.find_by_github_id(&record.github_id).await? {
        Some(existing) => store
            .update(existing.id, attrs)
            .await
            .map(|_| UpsertOutcome::Updated),
        None => store
            .create(&record.github_id, attrs)
            .await
            .map(|_| UpsertOutcome::Created),
    };
    absorb_constraint("repository", &record.github_id, result)
}

/// Resolve an author/reviewer reference to a user row, creating a shallow
/// row on first sighting and refreshing the login when it moved. Profile
/// fields are never touched here.
pub async fn ensure_user(stores: &dyn Stores, user: &UserRef) -> Result<UserRow, DbError> {
    let github_id = user.id.to_string();
    let store = stores.users();
    match store.find_by_github_id(&github_id).await? {
        Some(existing) if existing.login != user.login => {
            debug!(github_id = %github_id, old = %existing.login, new = %user.login, "login changed");
            store.update_login(existing.id, &user.login).await
        }
        Some(existing) => Ok(existing),
        None => {
            store
                .create(NewUser {
                    github_id,
                    login: user.login.clone(),
                })
                .await
        }
    }
}

pub async fn upsert_pull_request(
    stores: &dyn Stores,
    record: &NormalizedPullRequest,
) -> Result<UpsertOutcome, DbError> {
    // The target repository and author must already resolve; otherwise the
    // record is skipped rather than written as an orphan.
    let Some(repository) = stores
        .repositories()
        .find_by_github_id(&record.base_repo_github_id)
        .await?
    else {
        let reason = SkipReason::UnknownRepository {
            github_id: record.base_repo_github_id.clone(),
        };
        metrics::RECORDS_SKIPPED_TOTAL
            .with_label_values(&["pull_request", reason.label()])
            .inc();
        return Ok(UpsertOutcome::Skipped(reason));
    };

    let author = match ensure_user(stores, &record.author).await {
        Ok(author) => author,
        Err(DbError::Constraint(message)) => {
            warn!(
                github_id = %record.github_id,
                login = %record.author.login,
                %message,
                "author rejected by store constraint"
            );
            let reason = SkipReason::Constraint(message);
            metrics::RECORDS_SKIPPED_TOTAL
                .with_label_values(&["pull_request", reason.label()])
                .inc();
            return Ok(UpsertOutcome::Skipped(reason));
        }
        Err(other) => return Err(other),
    };

    let attrs = PullRequestAttrs {
        repository_id: repository.id,
        author_id: author.id,
        number: record.number,
        title: record.title.clone(),
        closed_at: record.closed_at,
        merged_at: record.merged_at,
        additions: record.additions,
        deletions: record.deletions,
        changed_files: record.changed_files,
        commit_count: record.commit_count,
    };

    let store = stores.pull_requests();
    let result = match store.find_by_github_id(&record.github_id).await? {
        Some(existing) => store
            .update(existing.id, attrs)
            .await
            .map(|_| UpsertOutcome::Updated),
        None => store
            .create(&record.github_id, attrs)
            .await
            .map(|_| UpsertOutcome::Created),
    };
    absorb_constraint("pull_request", &record.github_id, result)
}

pub async fn upsert_review(
    stores: &dyn Stores,
    pull_request_id: i64,
    record: &NormalizedReview,
) -> Result<UpsertOutcome, DbError> {
    let reviewer = match ensure_user(stores, &record.reviewer).await {
        Ok(reviewer) => reviewer,
        Err(DbError::Constraint(message)) => {
            warn!(
                github_id = %record.github_id,
                login = %record.reviewer.login,
                %message,
                "reviewer rejected by store constraint"
            );
            let reason = SkipReason::Constraint(message);
            metrics::RECORDS_SKIPPED_TOTAL
                .with_label_values(&["review", reason.label()])
                .inc();
            return Ok(UpsertOutcome::Skipped(reason));
        }
        Err(other) => return Err(other),
    };

    let attrs = ReviewAttrs {
        pull_request_id,
        reviewer_id: reviewer.id,
        state: record.state.as_str().to_string(),
        submitted_at: record.submitted_at,
    };

    let store = stores.reviews();
    let result = match store.find_by_github_id(&record.github_id).await? {
        Some(existing) => store
            .update(existing.id, attrs)
            .await
            .map(|_| UpsertOutcome::Updated),
        None => store
            .create(&record.github_id, attrs)
            .await
            .map(|_| UpsertOutcome::Created),
    };
    absorb_constraint("review", &record.github_id, result)
}

/// Apply a full profile fetch. A profile for an unseen user creates the row
/// first, so enrichment is safe to run standalone.
pub async fn upsert_user_profile(
    stores: &dyn Stores,
    record: &NormalizedUser,
) -> Result<UpsertOutcome, DbError> {
    let profile = UserProfile {
        login: record.login.clone(),
        name: record.name.clone(),
        email: record.email.clone(),
        bio: record.bio.clone(),
        company: record.company.clone(),
        location: record.location.clone(),
        blog: record.blog.clone(),
        twitter_username: record.twitter_username.clone(),
        public_repos: record.public_repos,
        public_gists: record.public_gists,
        followers: record.followers,
        following: record.following,
        github_created_at: record.github_created_at,
        github_updated_at: record.github_updated_at,
    };

    let store = stores.users();
    let result = match store.find_by_github_id(&record.github_id).await? {
        Some(existing) => store
            .update_profile(existing.id, profile)
            .await
            .map(|_| UpsertOutcome::Updated),
        None => {
            let created = store
                .create(NewUser {
                    github_id: record.github_id.clone(),
                    login: record.login.clone(),
                })
                .await;
            match created {
                Ok(row) => store
                    .update_profile(row.id, profile)
                    .await
                    .map(|_| UpsertOutcome::Created),
                Err(err) => Err(err),
            }
        }
    };
    absorb_constraint("user", &record.github_id, result)
}
