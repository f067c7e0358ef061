use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use gh_client::{ApiClient, ApiError, HttpExec, RetryPolicy};
use http::{Request, Response};
use serde_json::json;

/// Replays a scripted sequence of responses; the final entry repeats forever.
struct ScriptedExec {
    script: Mutex<Vec<ResponseSpec>>,
    calls: AtomicU32,
}

#[derive(Clone)]
struct ResponseSpec {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: serde_json::Value,
}

impl ScriptedExec {
    fn new(script: Vec<ResponseSpec>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpExec for ScriptedExec {
    async fn execute(&self, _req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let spec = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        };
        let mut builder = Response::builder().status(spec.status);
        for (name, value) in &spec.headers {
            builder = builder.header(*name, *value);
        }
        Ok(builder.body(serde_json::to_vec(&spec.body)?)?)
    }
}

fn ok(body: serde_json::Value) -> ResponseSpec {
    ResponseSpec {
        status: 200,
        headers: vec![
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4999"),
            ("x-ratelimit-reset", "1700000000"),
        ],
        body,
    }
}

fn status(status: u16) -> ResponseSpec {
    ResponseSpec {
        status,
        headers: vec![],
        body: json!({"message": "error"}),
    }
}

fn rate_limited() -> ResponseSpec {
    ResponseSpec {
        status: 403,
        headers: vec![
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1700000000"),
        ],
        body: json!({"message": "API rate limit exceeded"}),
    }
}

fn client(exec: Arc<ScriptedExec>) -> ApiClient {
    ApiClient::new(exec, "https://api.github.test", "test-token", "repo-pulse-tests").unwrap()
}

#[tokio::test(start_paused = true)]
async fn not_found_surfaces_on_the_first_attempt() {
    let exec = ScriptedExec::new(vec![status(404)]);
    let api = client(exec.clone());
    let retry = RetryPolicy::new(3);

    let result = retry
        .run("users/ghost", || api.get("users/ghost", &[]))
        .await;

    assert!(matches!(result, Err(ApiError::NotFound { .. })));
    assert_eq!(exec.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_server_error_exhausts_the_retry_budget() {
    let exec = ScriptedExec::new(vec![status(500)]);
    let api = client(exec.clone());
    let retry = RetryPolicy::new(3);

    let result = retry
        .run("orgs/acme/repos", || api.get("orgs/acme/repos", &[]))
        .await;

    assert!(matches!(result, Err(ApiError::Server { .. })));
    assert_eq!(exec.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_outage_recovers_on_retry() {
    let exec = ScriptedExec::new(vec![status(503), ok(json!([{"id": 1}]))]);
    let api = client(exec.clone());
    let retry = RetryPolicy::new(3);

    let items = retry
        .run("orgs/acme/repos", || api.get_array("orgs/acme/repos", &[]))
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(exec.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_is_retried_until_the_ceiling() {
    let exec = ScriptedExec::new(vec![rate_limited()]);
    let api = client(exec.clone());
    let retry = RetryPolicy::new(2);

    let params = [("page", "1".to_string())];
    let result = retry
        .run("repos/acme/web/pulls", || {
            api.get_array("repos/acme/web/pulls", &params)
        })
        .await;

    match result {
        Err(ApiError::RateLimit { reset, .. }) => assert!(reset.is_some()),
        other => panic!("expected rate limit error, got {other:?}"),
    }
    assert_eq!(exec.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn unprocessable_entity_is_fatal_validation() {
    let exec = ScriptedExec::new(vec![status(422)]);
    let api = client(exec.clone());
    let retry = RetryPolicy::new(3);

    let result = retry
        .run("orgs/acme/repos", || api.get("orgs/acme/repos", &[]))
        .await;

    assert!(matches!(result, Err(ApiError::Validation { .. })));
    assert_eq!(exec.calls(), 1);
}
