use std::sync::Arc;

use anyhow::{anyhow, Context};
use collector::{Collector, RestGithubClient};
use common::errors::{AppError, Result};
use common::{config::AppConfig, logging};
use db::pg::PgDatabase;
use db::{MemoryStores, Stores};
use gh_client::{ApiClient, RetryPolicy};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;
    if config.github.token.is_empty() {
        return Err(anyhow!("no GitHub token configured").into());
    }

    let api = ApiClient::from_config(&config.github).map_err(AppError::http)?;
    let retry = RetryPolicy::new(config.github.max_retries);
    let client = Arc::new(RestGithubClient::new(api, retry));

    let stores: Arc<dyn Stores> = if config.collector.dry_run {
        info!("dry run: using the in-memory store, nothing is persisted");
        Arc::new(MemoryStores::new())
    } else {
        let url = config
            .database
            .url
            .as_deref()
            .context("database.url must be configured for a persisted run")?;
        Arc::new(PgDatabase::connect(url).await.map_err(AppError::db)?)
    };

    let collector = Collector::new(config.collector.clone(), client, stores);
    info!(
        organization = %config.collector.organization,
        max_repositories = config.collector.max_repositories,
        include_reviews = config.collector.include_reviews,
        "collector started"
    );

    let summary = collector.run().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|err| AppError::Other(err.into()))?
    );

    if summary.success {
        Ok(())
    } else {
        Err(anyhow!(summary
            .error
            .unwrap_or_else(|| "collection failed".to_string()))
        .into())
    }
}
