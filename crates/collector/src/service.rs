use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use common::config::CollectorConfig;
use db::models::{PullRequestRow, RepositoryRow};
use db::Stores;
use gh_client::ApiError;
use normalizer::payloads::{PullRequestPayload, RepoPayload, ReviewPayload, UserPayload};
use normalizer::{
    normalize_pull_request, normalize_repo, normalize_review, normalize_user, NormalizeError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::client::{GithubClient, MAX_PAGE_SIZE};
use crate::metrics;
use crate::paginate::fetch_all_pages;
use crate::upsert;

/// Outward result surface of one collection run. Counts tally records that
/// were actually persisted (created or updated); skips are visible only in
/// logs and metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSummary {
    pub success: bool,
    pub repositories_count: u64,
    pub pull_requests_count: u64,
    pub reviews_count: u64,
    pub users_count: u64,
    pub error: Option<String>,
}

/// Sequences repository → pull request → review collection for one
/// organization, surviving per-repository and per-record failures.
pub struct Collector<C: GithubClient + 'static> {
    config: CollectorConfig,
    client: Arc<C>,
    stores: Arc<dyn Stores>,
}

impl<C: GithubClient + 'static> Collector<C> {
    pub fn new(config: CollectorConfig, client: Arc<C>, stores: Arc<dyn Stores>) -> Self {
        Self {
            config,
            client,
            stores,
        }
    }

    #[instrument(skip(self), fields(organization = %self.config.organization))]
    pub async fn run(&self) -> CollectionSummary {
        metrics::RUNS_TOTAL.inc();
        metrics::LAST_RUN_TIMESTAMP.set(Utc::now().timestamp());
        let _timer = metrics::RUN_DURATION.start_timer();

        let mut summary = CollectionSummary::default();
        match self.collect(&mut summary).await {
            Ok(()) => {
                summary.success = true;
                info!(
                    repositories = summary.repositories_count,
                    pull_requests = summary.pull_requests_count,
                    reviews = summary.reviews_count,
                    users = summary.users_count,
                    "collection run completed"
                );
            }
            Err(err) => {
                metrics::RUN_FAILURES_TOTAL.inc();
                error!(error = ?err, "collection run failed");
                summary.success = false;
                summary.error = Some(format!("{err:#}"));
            }
        }
        summary
    }

    async fn collect(&self, summary: &mut CollectionSummary) -> Result<()> {
        let repositories = self
            .collect_repositories(summary)
            .await
            .context("listing organization repositories")?;
        info!(count = repositories.len(), "repositories ingested");

        for (index, repository) in repositories.iter().enumerate() {
            if index > 0 {
                self.courtesy_pause().await;
            }
            match self.collect_pull_requests(repository, summary).await {
                Ok(()) => {
                    metrics::REPOS_PROCESSED_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                }
                Err(err) => {
                    metrics::REPOS_PROCESSED_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(
                        repository = %repository.name,
                        error = ?err,
                        "failed to collect pull requests; continuing with next repository"
                    );
                }
            }
        }

        if self.config.include_reviews {
            for repository in &repositories {
                if let Err(err) = self.collect_reviews(repository, summary).await {
                    warn!(
                        repository = %repository.name,
                        error = ?err,
                        "failed to collect reviews; continuing with next repository"
                    );
                }
            }
        }

        if self.config.include_user_profiles {
            self.collect_user_profiles(summary)
                .await
                .context("enriching user profiles")?;
        }

        Ok(())
    }

    async fn collect_repositories(
        &self,
        summary: &mut CollectionSummary,
    ) -> Result<Vec<RepositoryRow>> {
        let org = &self.config.organization;
        let per_page = self.config.page_size.min(MAX_PAGE_SIZE);
        let max_pages = pages_for(self.config.max_repositories as u32, per_page);

        let raw = fetch_all_pages("repositories", max_pages, |page| {
            self.client.list_org_repositories(org, page, per_page)
        })
        .await?;

        let mut rows = Vec::new();
        for value in raw.into_iter().take(self.config.max_repositories) {
            let Some(payload) = decode_record::<RepoPayload>("repository", &value) else {
                continue;
            };
            let record = match normalize_repo(&payload) {
                Ok(record) => record,
                Err(err) => {
                    skip_invalid("repository", &err);
                    continue;
                }
            };
            let outcome = upsert::upsert_repository(self.stores.as_ref(), &record).await?;
            if outcome.is_persisted() {
                summary.repositories_count += 1;
                if let Some(row) = self
                    .stores
                    .repositories()
                    .find_by_github_id(&record.github_id)
                    .await?
                {
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    #[instrument(skip(self, summary), fields(repository = %repository.name))]
    async fn collect_pull_requests(
        &self,
        repository: &RepositoryRow,
        summary: &mut CollectionSummary,
    ) -> Result<()> {
        let org = &self.config.organization;
        let per_page = self.config.page_size.min(MAX_PAGE_SIZE);
        let max_pages = pages_for(self.config.max_pull_requests_per_repo, per_page);

        let raw = fetch_all_pages("pull_requests", max_pages, |page| {
            self.client
                .list_pull_requests(org, &repository.name, page, per_page)
        })
        .await?;

        for value in raw
            .into_iter()
            .take(self.config.max_pull_requests_per_repo as usize)
        {
            let Some(payload) = decode_record::<PullRequestPayload>("pull_request", &value) else {
                continue;
            };
            let record = match normalize_pull_request(&payload) {
                Ok(record) => record,
                Err(err) => {
                    skip_invalid("pull_request", &err);
                    continue;
                }
            };
            let outcome = upsert::upsert_pull_request(self.stores.as_ref(), &record).await?;
            if outcome.is_persisted() {
                summary.pull_requests_count += 1;
                metrics::PULL_REQUESTS_PROCESSED_TOTAL.inc();
            }
        }
        Ok(())
    }

    /// Walks the stored pull requests of one repository and ingests their
    /// reviews. Walks at most `review_pull_request_limit` pull requests; the
    /// truncation is logged because it silently under-reports review data on
    /// busy repositories.
    async fn collect_reviews(
        &self,
        repository: &RepositoryRow,
        summary: &mut CollectionSummary,
    ) -> Result<()> {
        let limit = self.config.review_pull_request_limit;
        let total = self
            .stores
            .pull_requests()
            .count_by_repository(repository.id)
            .await?;
        if total > limit as i64 {
            warn!(
                repository = %repository.name,
                total,
                limit,
                "review collection truncated to the configured pull request limit"
            );
        }

        let pull_requests = self
            .stores
            .pull_requests()
            .list_by_repository(repository.id, limit as i64)
            .await?;

        for (index, pull_request) in pull_requests.iter().enumerate() {
            if index > 0 {
                self.courtesy_pause().await;
            }
            if let Err(err) = self
                .collect_reviews_for_pull(repository, pull_request, summary)
                .await
            {
                warn!(
                    repository = %repository.name,
                    number = pull_request.number,
                    error = ?err,
                    "failed to collect reviews for pull request; continuing"
                );
            }
        }
        Ok(())
    }

    async fn collect_reviews_for_pull(
        &self,
        repository: &RepositoryRow,
        pull_request: &PullRequestRow,
        summary: &mut CollectionSummary,
    ) -> Result<()> {
        let org = &self.config.organization;
        let per_page = self.config.page_size.min(MAX_PAGE_SIZE);

        let raw = fetch_all_pages("reviews", self.config.max_review_pages, |page| {
            self.client.list_reviews(
                org,
                &repository.name,
                pull_request.number,
                page,
                per_page,
            )
        })
        .await?;

        for value in raw {
            let Some(payload) = decode_record::<ReviewPayload>("review", &value) else {
                continue;
            };
            let record = match normalize_review(&payload) {
                Ok(record) => record,
                Err(err) => {
                    skip_invalid("review", &err);
                    continue;
                }
            };
            let outcome =
                upsert::upsert_review(self.stores.as_ref(), pull_request.id, &record).await?;
            if outcome.is_persisted() {
                summary.reviews_count += 1;
                metrics::REVIEWS_PROCESSED_TOTAL.inc();
            }
        }
        Ok(())
    }

    /// Later enrichment pass: fetch the full profile of every stored
    /// contributor by login. A vanished user is skipped, not fatal.
    async fn collect_user_profiles(&self, summary: &mut CollectionSummary) -> Result<()> {
        let users = self
            .stores
            .users()
            .list(self.config.max_user_profiles as i64)
            .await?;
        info!(count = users.len(), "enriching user profiles");

        for (index, user) in users.iter().enumerate() {
            if index > 0 {
                self.courtesy_pause().await;
            }
            let value = match self.client.get_user(&user.login).await {
                Ok(value) => value,
                Err(ApiError::NotFound { .. }) => {
                    warn!(login = %user.login, "user vanished upstream; skipping profile");
                    metrics::RECORDS_SKIPPED_TOTAL
                        .with_label_values(&["user", "not_found"])
                        .inc();
                    continue;
                }
                Err(err) => {
                    warn!(
                        login = %user.login,
                        error = %err,
                        "failed to fetch user profile; continuing"
                    );
                    continue;
                }
            };

            let Some(payload) = decode_record::<UserPayload>("user", &value) else {
                continue;
            };
            let record = match normalize_user(&payload) {
                Ok(record) => record,
                Err(err) => {
                    skip_invalid("user", &err);
                    continue;
                }
            };
            let outcome = upsert::upsert_user_profile(self.stores.as_ref(), &record).await?;
            if outcome.is_persisted() {
                summary.users_count += 1;
                metrics::USER_PROFILES_PROCESSED_TOTAL.inc();
            }
        }
        Ok(())
    }

    /// Fixed inter-item delay above reactive backoff. Skipped in dry runs.
    async fn courtesy_pause(&self) {
        if self.config.dry_run || self.config.pause_ms == 0 {
            return;
        }
        sleep(Duration::from_millis(self.config.pause_ms)).await;
    }
}

fn pages_for(max_items: u32, per_page: u32) -> u32 {
    max_items.div_ceil(per_page.max(1)).max(1)
}

fn decode_record<T: serde::de::DeserializeOwned>(entity: &'static str, value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(entity, error = %err, "malformed record; skipping");
            metrics::RECORDS_SKIPPED_TOTAL
                .with_label_values(&[entity, "malformed"])
                .inc();
            None
        }
    }
}

fn skip_invalid(entity: &'static str, err: &NormalizeError) {
    warn!(entity, error = %err, "record failed validation; skipping");
    metrics::RECORDS_SKIPPED_TOTAL
        .with_label_values(&[entity, "missing_field"])
        .inc();
}
