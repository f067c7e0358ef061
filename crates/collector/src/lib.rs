pub mod client;
pub mod metrics;
pub mod paginate;
pub mod service;
pub mod upsert;

pub use client::{GithubClient, RestGithubClient};
pub use service::{CollectionSummary, Collector};
pub use upsert::{SkipReason, UpsertOutcome};
