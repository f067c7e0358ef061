use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use http::{header, HeaderMap, Request, Response, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::metrics;
use crate::rate_limit::{self, parse_rate_limit};

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[async_trait]
pub trait HttpExec: Send + Sync {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExec for ReqwestExecutor {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = req.into_parts();
        let mut builder = self.client.request(parts.method, parts.uri.to_string());
        builder = builder.headers(parts.headers);
        let resp = builder.body(body).send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?;
        let mut builder = Response::builder().status(status);
        *builder.headers_mut().unwrap() = headers;
        Ok(builder.body(bytes.to_vec())?)
    }
}

/// Issues one authenticated GET against the GitHub REST API and classifies
/// the response into an [`ApiError`] or a parsed JSON payload. Retry and
/// pagination live above this layer.
pub struct ApiClient {
    exec: Arc<dyn HttpExec>,
    base: Url,
    token: String,
    user_agent: String,
}

impl ApiClient {
    pub fn new(
        exec: Arc<dyn HttpExec>,
        base_url: &str,
        token: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            exec,
            base: Url::parse(&base)?,
            token: token.into(),
            user_agent: user_agent.into(),
        })
    }

    /// Build a client straight from the application configuration, using the
    /// default reqwest executor with the configured timeout.
    pub fn from_config(config: &common::config::GithubConfig) -> Result<Self> {
        let exec = Arc::new(ReqwestExecutor::new(Duration::from_secs(
            config.timeout_secs,
        ))?);
        Self::new(
            exec,
            &config.base_url,
            config.token.clone(),
            config.user_agent.clone(),
        )
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let endpoint = path.to_string();
        let url = self.build_url(path, query)?;
        debug!(endpoint = %endpoint, url = %url, "dispatching GitHub request");

        let request = self.build_request(&url, &endpoint)?;
        let response = self
            .exec
            .execute(request)
            .await
            .map_err(|source| ApiError::Network {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if let Some(snapshot) = parse_rate_limit(response.headers()) {
            rate_limit::observe(&endpoint, &snapshot);
        }

        if status.is_success() {
            metrics::REQUESTS_TOTAL.with_label_values(&["success"]).inc();
            return serde_json::from_slice(response.body()).map_err(|source| ApiError::Decode {
                endpoint,
                source,
            });
        }

        let err = classify_failure(status, response.headers(), &endpoint);
        metrics::REQUESTS_TOTAL.with_label_values(&[err.kind()]).inc();
        Err(err)
    }

    /// GET an endpoint whose payload is a JSON array of records.
    pub async fn get_array(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, ApiError> {
        let value = self.get(path, query).await?;
        match value {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            _ => Err(ApiError::Decode {
                endpoint: path.to_string(),
                source: serde::de::Error::custom("expected an array payload"),
            }),
        }
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Network {
                endpoint: path.to_string(),
                source: err.into(),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn build_request(&self, url: &Url, endpoint: &str) -> Result<Request<Vec<u8>>, ApiError> {
        Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::USER_AGENT, self.user_agent.clone())
            .header("X-GitHub-Api-Version", API_VERSION)
            .body(Vec::new())
            .map_err(|err| ApiError::Network {
                endpoint: endpoint.to_string(),
                source: err.into(),
            })
    }
}

/// Table-driven status classification.
fn classify_failure(status: StatusCode, headers: &HeaderMap, endpoint: &str) -> ApiError {
    let endpoint = endpoint.to_string();
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Authentication { endpoint },
        StatusCode::FORBIDDEN => {
            // 403 doubles as GitHub's primary rate-limit response; only the
            // exhausted-quota shape is retryable.
            let snapshot = parse_rate_limit(headers);
            match snapshot {
                Some(snapshot) if snapshot.is_exhausted() => ApiError::RateLimit {
                    endpoint,
                    reset: Some(snapshot.reset),
                },
                _ => ApiError::Forbidden { endpoint },
            }
        }
        StatusCode::NOT_FOUND => ApiError::NotFound { endpoint },
        StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation { endpoint },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit {
            endpoint,
            reset: parse_rate_limit(headers).map(|s| s.reset),
        },
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ApiError::Transient { status, endpoint }
        }
        s if s.is_server_error() => ApiError::Server { status, endpoint },
        _ => ApiError::Api { status, endpoint },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn rate_limit_headers(remaining: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        map.insert(
            "x-ratelimit-remaining",
            HeaderValue::from_str(remaining).unwrap(),
        );
        map.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("1700000000"),
        );
        map
    }

    #[test]
    fn forbidden_with_exhausted_quota_is_rate_limit() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            &rate_limit_headers("0"),
            "repos/acme/web/pulls",
        );
        assert!(matches!(err, ApiError::RateLimit { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn forbidden_with_quota_left_is_fatal() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            &rate_limit_headers("100"),
            "repos/acme/web/pulls",
        );
        assert!(matches!(err, ApiError::Forbidden { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn bad_gateway_family_is_transient_other_5xx_is_server() {
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            let err = classify_failure(status, &HeaderMap::new(), "orgs/acme/repos");
            assert!(matches!(err, ApiError::Transient { .. }));
        }
        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            &HeaderMap::new(),
            "orgs/acme/repos",
        );
        assert!(matches!(err, ApiError::Server { .. }));
    }

    #[test]
    fn unexpected_status_is_generic_api_error() {
        let err = classify_failure(StatusCode::GONE, &HeaderMap::new(), "orgs/acme/repos");
        assert!(matches!(err, ApiError::Api { .. }));
        assert!(!err.is_retryable());
    }
}
