//! In-memory implementation of the store contract. Backs dry runs and the
//! behavioural test suites; enforces the same field-level and uniqueness
//! constraints as the Postgres implementation.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{DbError, Result};
use crate::models::{
    NewUser, PullRequestAttrs, PullRequestRow, RepositoryAttrs, RepositoryRow, ReviewAttrs,
    ReviewRow, UserProfile, UserRow,
};
use crate::stores::{PullRequestStore, RepositoryStore, ReviewStore, Stores, UserStore};

#[derive(Default)]
pub struct MemoryStores {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    repositories: Vec<RepositoryRow>,
    users: Vec<UserRow>,
    pull_requests: Vec<PullRequestRow>,
    reviews: Vec<ReviewRow>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.lock().expect("memory store mutex poisoned");
        f(&mut guard)
    }
}

impl Stores for MemoryStores {
    fn repositories(&self) -> &dyn RepositoryStore {
        self
    }

    fn users(&self) -> &dyn UserStore {
        self
    }

    fn pull_requests(&self) -> &dyn PullRequestStore {
        self
    }

    fn reviews(&self) -> &dyn ReviewStore {
        self
    }
}

#[async_trait]
impl RepositoryStore for MemoryStores {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<RepositoryRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .repositories
                .iter()
                .find(|row| row.github_id == github_id)
                .cloned()
        }))
    }

    async fn create(&self, github_id: &str, attrs: RepositoryAttrs) -> Result<RepositoryRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            if inner.repositories.iter().any(|row| row.github_id == github_id) {
                return Err(DbError::constraint(format!(
                    "repository github_id `{github_id}` already exists"
                )));
            }
            let row = RepositoryRow {
                id: inner.allocate_id(),
                github_id: github_id.to_string(),
                name: attrs.name,
                url: attrs.url,
                is_private: attrs.is_private,
                is_archived: attrs.is_archived,
            };
            inner.repositories.push(row.clone());
            Ok(row)
        })
    }

    async fn update(&self, id: i64, attrs: RepositoryAttrs) -> Result<RepositoryRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            let row = inner
                .repositories
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(DbError::NotFound)?;
            row.name = attrs.name;
            row.url = attrs.url;
            row.is_private = attrs.is_private;
            row.is_archived = attrs.is_archived;
            Ok(row.clone())
        })
    }

    async fn list(&self, limit: i64) -> Result<Vec<RepositoryRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .repositories
                .iter()
                .take(limit.max(0) as usize)
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl UserStore for MemoryStores {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<UserRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .users
                .iter()
                .find(|row| row.github_id == github_id)
                .cloned()
        }))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        Ok(self.with_inner(|inner| inner.users.iter().find(|row| row.login == login).cloned()))
    }

    async fn create(&self, user: NewUser) -> Result<UserRow> {
        user.validate()?;
        self.with_inner(|inner| {
            if inner.users.iter().any(|row| row.github_id == user.github_id) {
                return Err(DbError::constraint(format!(
                    "user github_id `{}` already exists",
                    user.github_id
                )));
            }
            if inner.users.iter().any(|row| row.login == user.login) {
                return Err(DbError::constraint(format!(
                    "user login `{}` already exists",
                    user.login
                )));
            }
            let row = UserRow {
                id: inner.allocate_id(),
                github_id: user.github_id,
                login: user.login,
                name: None,
                email: None,
                bio: None,
                company: None,
                location: None,
                blog: None,
                twitter_username: None,
                public_repos: None,
                public_gists: None,
                followers: None,
                following: None,
                github_created_at: None,
                github_updated_at: None,
            };
            inner.users.push(row.clone());
            Ok(row)
        })
    }

    async fn update_login(&self, id: i64, login: &str) -> Result<UserRow> {
        if login.trim().is_empty() {
            return Err(DbError::constraint("user login must be present"));
        }
        self.with_inner(|inner| {
            if inner
                .users
                .iter()
                .any(|row| row.login == login && row.id != id)
            {
                return Err(DbError::constraint(format!(
                    "user login `{login}` already exists"
                )));
            }
            let row = inner
                .users
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(DbError::NotFound)?;
            row.login = login.to_string();
            Ok(row.clone())
        })
    }

    async fn update_profile(&self, id: i64, profile: UserProfile) -> Result<UserRow> {
        profile.validate()?;
        self.with_inner(|inner| {
            if inner
                .users
                .iter()
                .any(|row| row.login == profile.login && row.id != id)
            {
                return Err(DbError::constraint(format!(
                    "user login `{}` already exists",
                    profile.login
                )));
            }
            let row = inner
                .users
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(DbError::NotFound)?;
            row.login = profile.login;
            row.name = profile.name;
            row.email = profile.email;
            row.bio = profile.bio;
            row.company = profile.company;
            row.location = profile.location;
            row.blog = profile.blog;
            row.twitter_username = profile.twitter_username;
            row.public_repos = profile.public_repos;
            row.public_gists = profile.public_gists;
            row.followers = profile.followers;
            row.following = profile.following;
            row.github_created_at = profile.github_created_at;
            row.github_updated_at = profile.github_updated_at;
            Ok(row.clone())
        })
    }

    async fn list(&self, limit: i64) -> Result<Vec<UserRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .users
                .iter()
                .take(limit.max(0) as usize)
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl PullRequestStore for MemoryStores {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<PullRequestRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .pull_requests
                .iter()
                .find(|row| row.github_id == github_id)
                .cloned()
        }))
    }

    async fn create(&self, github_id: &str, attrs: PullRequestAttrs) -> Result<PullRequestRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            if inner
                .pull_requests
                .iter()
                .any(|row| row.github_id == github_id)
            {
                return Err(DbError::constraint(format!(
                    "pull request github_id `{github_id}` already exists"
                )));
            }
            let row = PullRequestRow {
                id: inner.allocate_id(),
                github_id: github_id.to_string(),
                repository_id: attrs.repository_id,
                author_id: attrs.author_id,
                number: attrs.number,
                title: attrs.title,
                closed_at: attrs.closed_at,
                merged_at: attrs.merged_at,
                additions: attrs.additions,
                deletions: attrs.deletions,
                changed_files: attrs.changed_files,
                commit_count: attrs.commit_count,
            };
            inner.pull_requests.push(row.clone());
            Ok(row)
        })
    }

    async fn update(&self, id: i64, attrs: PullRequestAttrs) -> Result<PullRequestRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            let row = inner
                .pull_requests
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(DbError::NotFound)?;
            row.repository_id = attrs.repository_id;
            row.author_id = attrs.author_id;
            row.number = attrs.number;
            row.title = attrs.title;
            row.closed_at = attrs.closed_at;
            row.merged_at = attrs.merged_at;
            row.additions = attrs.additions;
            row.deletions = attrs.deletions;
            row.changed_files = attrs.changed_files;
            row.commit_count = attrs.commit_count;
            Ok(row.clone())
        })
    }

    async fn list_by_repository(
        &self,
        repository_id: i64,
        limit: i64,
    ) -> Result<Vec<PullRequestRow>> {
        Ok(self.with_inner(|inner| {
            let mut rows: Vec<PullRequestRow> = inner
                .pull_requests
                .iter()
                .filter(|row| row.repository_id == repository_id)
                .cloned()
                .collect();
            rows.sort_by_key(|row| row.number);
            rows.truncate(limit.max(0) as usize);
            rows
        }))
    }

    async fn count_by_repository(&self, repository_id: i64) -> Result<i64> {
        Ok(self.with_inner(|inner| {
            inner
                .pull_requests
                .iter()
                .filter(|row| row.repository_id == repository_id)
                .count() as i64
        }))
    }
}

#[async_trait]
impl ReviewStore for MemoryStores {
    async fn find_by_github_id(&self, github_id: &str) -> Result<Option<ReviewRow>> {
        Ok(self.with_inner(|inner| {
            inner
                .reviews
                .iter()
                .find(|row| row.github_id == github_id)
                .cloned()
        }))
    }

    async fn create(&self, github_id: &str, attrs: ReviewAttrs) -> Result<ReviewRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            if inner.reviews.iter().any(|row| row.github_id == github_id) {
                return Err(DbError::constraint(format!(
                    "review github_id `{github_id}` already exists"
                )));
            }
            let row = ReviewRow {
                id: inner.allocate_id(),
                github_id: github_id.to_string(),
                pull_request_id: attrs.pull_request_id,
                reviewer_id: attrs.reviewer_id,
                state: attrs.state,
                submitted_at: attrs.submitted_at,
            };
            inner.reviews.push(row.clone());
            Ok(row)
        })
    }

    async fn update(&self, id: i64, attrs: ReviewAttrs) -> Result<ReviewRow> {
        attrs.validate()?;
        self.with_inner(|inner| {
            let row = inner
                .reviews
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(DbError::NotFound)?;
            row.pull_request_id = attrs.pull_request_id;
            row.reviewer_id = attrs.reviewer_id;
            row.state = attrs.state;
            row.submitted_at = attrs.submitted_at;
            Ok(row.clone())
        })
    }
}
