use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

pub static RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "collector_runs_total",
        "Collection runs attempted"
    )
    .expect("collector runs total")
});

pub static RUN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "collector_run_failures_total",
        "Collection runs that failed before completing the repository listing"
    )
    .expect("collector run failures total")
});

pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "collector_last_run_timestamp_seconds",
        "Unix timestamp when a collection run last started"
    )
    .expect("collector last run timestamp")
});

pub static REPOS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "collector_repositories_processed_total",
        "Repositories processed grouped by outcome",
        &["outcome"]
    )
    .expect("collector repositories processed")
});

pub static PULL_REQUESTS_PROCESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "collector_pull_requests_processed_total",
        "Pull requests upserted across all runs"
    )
    .expect("collector pull requests processed")
});

pub static REVIEWS_PROCESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "collector_reviews_processed_total",
        "Reviews upserted across all runs"
    )
    .expect("collector reviews processed")
});

pub static USER_PROFILES_PROCESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "collector_user_profiles_processed_total",
        "User profiles fetched and upserted across all runs"
    )
    .expect("collector user profiles processed")
});

pub static RECORDS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "collector_records_skipped_total",
        "Raw records skipped during ingestion grouped by entity and reason",
        &["entity", "reason"]
    )
    .expect("collector records skipped")
});

pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "collector_run_duration_seconds",
        "Duration of collection runs in seconds",
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]
    )
    .expect("collector run duration histogram")
});
