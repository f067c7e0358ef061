use chrono::{DateTime, Utc};
use http::HeaderMap;
use tracing::warn;

use crate::metrics;

/// Remaining quota below which a distinct warning is emitted. Informational
/// only; the request that carried the headers still succeeded.
pub const LOW_REMAINING_THRESHOLD: i64 = 10;

#[derive(Debug, Clone)]
pub struct RateLimitSnapshot {
    pub limit: i64,
    pub remaining: i64,
    pub reset: DateTime<Utc>,
}

impl RateLimitSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }

    pub fn is_low(&self) -> bool {
        self.remaining < LOW_REMAINING_THRESHOLD
    }
}

pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let limit = header_i64(headers, "x-ratelimit-limit")?;
    let remaining = header_i64(headers, "x-ratelimit-remaining")?;
    let reset_ts = header_i64(headers, "x-ratelimit-reset")?;
    let reset = DateTime::from_timestamp(reset_ts, 0)?;
    Some(RateLimitSnapshot {
        limit,
        remaining,
        reset,
    })
}

/// Export the snapshot and flag a nearly-drained quota.
pub fn observe(endpoint: &str, snapshot: &RateLimitSnapshot) {
    metrics::RATE_LIMIT.set(snapshot.limit);
    metrics::RATE_REMAINING.set(snapshot.remaining);
    metrics::RATE_RESET_TIMESTAMP.set(snapshot.reset.timestamp());

    if snapshot.is_low() {
        metrics::LOW_REMAINING_EVENTS_TOTAL.inc();
        warn!(
            endpoint,
            remaining = snapshot.remaining,
            limit = snapshot.limit,
            reset = snapshot.reset.timestamp(),
            "rate limit nearly exhausted"
        );
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
}
