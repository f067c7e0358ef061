use chrono::{DateTime, Utc};
use http::StatusCode;

/// Classified outcome of one GitHub API request.
///
/// The first eight variants mirror the upstream failure modes the pipeline
/// distinguishes; `Network` and `Decode` cover the transport's own failure
/// surface (a request that never produced a status, and a 2xx body that is
/// not the JSON we asked for).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed for {endpoint}")]
    Authentication { endpoint: String },
    #[error("access forbidden for {endpoint}")]
    Forbidden { endpoint: String },
    #[error("not found: {endpoint}")]
    NotFound { endpoint: String },
    #[error("request rejected as unprocessable for {endpoint}")]
    Validation { endpoint: String },
    #[error("rate limit exhausted for {endpoint}")]
    RateLimit {
        endpoint: String,
        reset: Option<DateTime<Utc>>,
    },
    #[error("server error {status} for {endpoint}")]
    Server {
        status: StatusCode,
        endpoint: String,
    },
    #[error("transient upstream error {status} for {endpoint}")]
    Transient {
        status: StatusCode,
        endpoint: String,
    },
    #[error("unexpected status {status} for {endpoint}")]
    Api {
        status: StatusCode,
        endpoint: String,
    },
    #[error("network error for {endpoint}")]
    Network {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid response body for {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Whether the retry policy may resubmit the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimit { .. }
                | ApiError::Server { .. }
                | ApiError::Transient { .. }
                | ApiError::Network { .. }
        )
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Authentication { .. } => "authentication",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Validation { .. } => "validation",
            ApiError::RateLimit { .. } => "rate_limit",
            ApiError::Server { .. } => "server",
            ApiError::Transient { .. } => "transient",
            ApiError::Api { .. } => "api",
            ApiError::Network { .. } => "network",
            ApiError::Decode { .. } => "decode",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::Authentication { endpoint }
            | ApiError::Forbidden { endpoint }
            | ApiError::NotFound { endpoint }
            | ApiError::Validation { endpoint }
            | ApiError::RateLimit { endpoint, .. }
            | ApiError::Server { endpoint, .. }
            | ApiError::Transient { endpoint, .. }
            | ApiError::Api { endpoint, .. }
            | ApiError::Network { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => endpoint,
        }
    }
}
