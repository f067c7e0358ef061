use async_trait::async_trait;
use gh_client::{ApiClient, ApiError, RetryPolicy};
use serde_json::Value;

/// Upstream maximum page size; larger requests are silently clamped there.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One method per collection endpoint. Implementations return raw JSON
/// records with retries already applied; normalization happens downstream.
#[async_trait]
pub trait GithubClient: Send + Sync {
    async fn list_org_repositories(
        &self,
        org: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError>;

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError>;

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError>;

    async fn get_user(&self, login: &str) -> Result<Value, ApiError>;
}

pub struct RestGithubClient {
    api: ApiClient,
    retry: RetryPolicy,
}

impl RestGithubClient {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    fn page_params(page: u32, per_page: u32) -> [(&'static str, String); 2] {
        [
            ("page", page.to_string()),
            ("per_page", per_page.min(MAX_PAGE_SIZE).to_string()),
        ]
    }
}

#[async_trait]
impl GithubClient for RestGithubClient {
    async fn list_org_repositories(
        &self,
        org: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let path = format!("orgs/{org}/repos");
        let mut params = vec![
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        params.extend(Self::page_params(page, per_page));
        self.retry
            .run(&path, || self.api.get_array(&path, &params))
            .await
    }

    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let path = format!("repos/{owner}/{repo}/pulls");
        let mut params = vec![
            ("state", "all".to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        params.extend(Self::page_params(page, per_page));
        self.retry
            .run(&path, || self.api.get_array(&path, &params))
            .await
    }

    async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let path = format!("repos/{owner}/{repo}/pulls/{number}/reviews");
        let params = Self::page_params(page, per_page);
        self.retry
            .run(&path, || self.api.get_array(&path, &params))
            .await
    }

    async fn get_user(&self, login: &str) -> Result<Value, ApiError> {
        let path = format!("users/{login}");
        self.retry.run(&path, || self.api.get(&path, &[])).await
    }
}
