use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_client_requests_total",
        "GitHub API requests grouped by classified outcome",
        &["outcome"]
    )
    .expect("gh client requests total")
});

pub static RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_client_retries_total",
        "Backoff retries grouped by the error kind that triggered them",
        &["kind"]
    )
    .expect("gh client retries total")
});

pub static RATE_LIMIT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "gh_client_rate_limit",
        "Hourly request quota reported by the most recent response"
    )
    .expect("gh client rate limit gauge")
});

pub static RATE_REMAINING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "gh_client_rate_limit_remaining",
        "Remaining request quota reported by the most recent response"
    )
    .expect("gh client rate remaining gauge")
});

pub static RATE_RESET_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "gh_client_rate_limit_reset_timestamp_seconds",
        "Unix timestamp at which the request quota resets"
    )
    .expect("gh client rate reset gauge")
});

pub static LOW_REMAINING_EVENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_client_rate_limit_low_events_total",
        "Responses whose remaining quota fell below the warning threshold"
    )
    .expect("gh client low remaining events")
});
