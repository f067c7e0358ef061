use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub github: GithubConfig,
    pub collector: CollectorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "GithubConfig::default_base_url")]
    pub base_url: String,
    pub token: String,
    #[serde(default = "GithubConfig::default_user_agent")]
    pub user_agent: String,
    #[serde(default = "GithubConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "GithubConfig::default_max_retries")]
    pub max_retries: u32,
}

impl GithubConfig {
    fn default_base_url() -> String {
        "https://api.github.com".to_string()
    }

    fn default_user_agent() -> String {
        "repo-pulse/0.1".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        30
    }

    const fn default_max_retries() -> u32 {
        3
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub organization: String,
    #[serde(default = "CollectorConfig::default_page_size")]
    pub page_size: u32,
    #[serde(default = "CollectorConfig::default_max_repositories")]
    pub max_repositories: usize,
    #[serde(default = "CollectorConfig::default_max_pull_requests_per_repo")]
    pub max_pull_requests_per_repo: u32,
    #[serde(default)]
    pub include_reviews: bool,
    #[serde(default = "CollectorConfig::default_review_pull_request_limit")]
    pub review_pull_request_limit: usize,
    #[serde(default = "CollectorConfig::default_max_review_pages")]
    pub max_review_pages: u32,
    #[serde(default)]
    pub include_user_profiles: bool,
    #[serde(default = "CollectorConfig::default_max_user_profiles")]
    pub max_user_profiles: usize,
    #[serde(default = "CollectorConfig::default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
}

impl CollectorConfig {
    const fn default_page_size() -> u32 {
        100
    }

    const fn default_max_repositories() -> usize {
        100
    }

    const fn default_max_pull_requests_per_repo() -> u32 {
        1000
    }

    // Review collection walks this many stored pull requests per repository.
    // Raising it is safe but multiplies API call volume accordingly.
    const fn default_review_pull_request_limit() -> usize {
        50
    }

    const fn default_max_review_pages() -> u32 {
        5
    }

    const fn default_max_user_profiles() -> usize {
        100
    }

    const fn default_pause_ms() -> u64 {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_defaults_apply() {
        let cfg: CollectorConfig =
            serde_json::from_value(serde_json::json!({ "organization": "vercel" })).unwrap();
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.review_pull_request_limit, 50);
        assert!(!cfg.include_reviews);
        assert!(!cfg.dry_run);
    }
}
