use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::{DbError, Result};

/// Accepted review states, matching the upstream vocabulary after mapping.
pub const REVIEW_STATES: [&str; 4] = ["approved", "changes_requested", "commented", "dismissed"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RepositoryRow {
    pub id: i64,
    pub github_id: String,
    pub name: String,
    pub url: String,
    pub is_private: bool,
    pub is_archived: bool,
}

/// Mutable attribute set of a repository; the github_id identity never
/// travels through updates.
#[derive(Debug, Clone)]
pub struct RepositoryAttrs {
    pub name: String,
    pub url: String,
    pub is_private: bool,
    pub is_archived: bool,
}

impl RepositoryAttrs {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::constraint("repository name must be present"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(DbError::constraint(format!(
                "repository url must be http(s): {}",
                self.url
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub github_id: String,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub public_repos: Option<i64>,
    pub public_gists: Option<i64>,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub github_created_at: Option<DateTime<Utc>>,
    pub github_updated_at: Option<DateTime<Utc>>,
}

/// Shallow creation shape: a user first seen as an author or reviewer
/// reference carries nothing but identity and login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub github_id: String,
    pub login: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.github_id.trim().is_empty() {
            return Err(DbError::constraint("user github_id must be present"));
        }
        if self.login.trim().is_empty() {
            return Err(DbError::constraint("user login must be present"));
        }
        Ok(())
    }
}

/// Full profile attribute set applied by the enrichment fetch.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub public_repos: Option<i64>,
    pub public_gists: Option<i64>,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub github_created_at: Option<DateTime<Utc>>,
    pub github_updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn validate(&self) -> Result<()> {
        if self.login.trim().is_empty() {
            return Err(DbError::constraint("user login must be present"));
        }
        for (field, value) in [
            ("public_repos", self.public_repos),
            ("public_gists", self.public_gists),
            ("followers", self.followers),
            ("following", self.following),
        ] {
            if value.is_some_and(|count| count < 0) {
                return Err(DbError::constraint(format!(
                    "user {field} must be non-negative"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PullRequestRow {
    pub id: i64,
    pub github_id: String,
    pub repository_id: i64,
    pub author_id: i64,
    pub number: i64,
    pub title: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub commit_count: i64,
}

impl PullRequestRow {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PullRequestAttrs {
    pub repository_id: i64,
    pub author_id: i64,
    pub number: i64,
    pub title: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub commit_count: i64,
}

impl PullRequestAttrs {
    pub fn validate(&self) -> Result<()> {
        if self.number <= 0 {
            return Err(DbError::constraint("pull request number must be positive"));
        }
        if self.title.trim().is_empty() {
            return Err(DbError::constraint("pull request title must be present"));
        }
        for (field, value) in [
            ("additions", self.additions),
            ("deletions", self.deletions),
            ("changed_files", self.changed_files),
            ("commit_count", self.commit_count),
        ] {
            if value < 0 {
                return Err(DbError::constraint(format!(
                    "pull request {field} must be non-negative"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub github_id: String,
    pub pull_request_id: i64,
    pub reviewer_id: i64,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ReviewRow {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ReviewAttrs {
    pub pull_request_id: i64,
    pub reviewer_id: i64,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ReviewAttrs {
    pub fn validate(&self) -> Result<()> {
        if !REVIEW_STATES.contains(&self.state.as_str()) {
            return Err(DbError::constraint(format!(
                "review state must be one of {REVIEW_STATES:?}, got `{}`",
                self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_attrs_reject_negative_counters() {
        let attrs = PullRequestAttrs {
            repository_id: 1,
            author_id: 1,
            number: 5,
            title: "Fix".into(),
            closed_at: None,
            merged_at: None,
            additions: -1,
            deletions: 0,
            changed_files: 0,
            commit_count: 0,
        };
        assert!(attrs.validate().unwrap_err().is_constraint());
    }

    #[test]
    fn review_attrs_reject_unknown_state() {
        let attrs = ReviewAttrs {
            pull_request_id: 1,
            reviewer_id: 1,
            state: "PENDING".into(),
            submitted_at: None,
        };
        assert!(attrs.validate().unwrap_err().is_constraint());
    }

    #[test]
    fn repository_attrs_require_http_url() {
        let attrs = RepositoryAttrs {
            name: "web".into(),
            url: "ftp://example.com".into(),
            is_private: false,
            is_archived: false,
        };
        assert!(attrs.validate().unwrap_err().is_constraint());
    }
}
