use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use collector::{Collector, GithubClient};
use common::config::CollectorConfig;
use db::{MemoryStores, Stores};
use gh_client::ApiError;
use serde_json::{json, Value};

/// Serves canned page-1 payloads; every later page is empty. Repositories
/// listed in `pull_errors` fail their pull-request listing the way a request
/// looks after the retry ceiling is exhausted.
#[derive(Default)]
struct ScriptedClient {
    repos: Vec<Value>,
    pulls: HashMap<String, Vec<Value>>,
    reviews: HashMap<(String, i64), Vec<Value>>,
    users: HashMap<String, Value>,
    pull_errors: HashSet<String>,
    fail_repo_listing: bool,
}

#[async_trait]
impl GithubClient for ScriptedClient {
    async fn list_org_repositories(
        &self,
        org: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        if self.fail_repo_listing {
            return Err(ApiError::Authentication {
                endpoint: format!("orgs/{org}/repos"),
            });
        }
        if page == 1 {
            Ok(self.repos.clone())
        } else {
            Ok(vec![])
        }
    }

    async fn list_pull_requests(
        &self,
        _owner: &str,
        repo: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        if self.pull_errors.contains(repo) {
            return Err(ApiError::RateLimit {
                endpoint: format!("repos/acme/{repo}/pulls"),
                reset: None,
            });
        }
        if page == 1 {
            Ok(self.pulls.get(repo).cloned().unwrap_or_default())
        } else {
            Ok(vec![])
        }
    }

    async fn list_reviews(
        &self,
        _owner: &str,
        repo: &str,
        number: i64,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        if page == 1 {
            Ok(self
                .reviews
                .get(&(repo.to_string(), number))
                .cloned()
                .unwrap_or_default())
        } else {
            Ok(vec![])
        }
    }

    async fn get_user(&self, login: &str) -> Result<Value, ApiError> {
        self.users
            .get(login)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                endpoint: format!("users/{login}"),
            })
    }
}

fn repo(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "html_url": format!("https://github.com/acme/{name}"),
        "private": false,
        "archived": false
    })
}

#[allow(clippy::too_many_arguments)]
fn pull(
    id: i64,
    number: i64,
    repo_id: i64,
    user_id: i64,
    login: &str,
    closed_at: Option<&str>,
    merged_at: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "number": number,
        "title": format!("change #{number}"),
        "user": {"id": user_id, "login": login},
        "base": {"repo": {"id": repo_id}},
        "closed_at": closed_at,
        "merged_at": merged_at,
        "additions": 12,
        "deletions": 4,
        "changed_files": 2,
        "commits": 1
    })
}

fn review(id: i64, user_id: i64, login: &str, state: &str) -> Value {
    json!({
        "id": id,
        "user": {"id": user_id, "login": login},
        "state": state,
        "submitted_at": "2025-06-01T10:00:00Z"
    })
}

fn config() -> CollectorConfig {
    CollectorConfig {
        organization: "acme".into(),
        page_size: 100,
        max_repositories: 10,
        max_pull_requests_per_repo: 20,
        include_reviews: false,
        review_pull_request_limit: 50,
        max_review_pages: 5,
        include_user_profiles: false,
        max_user_profiles: 100,
        pause_ms: 0,
        dry_run: false,
    }
}

fn three_pull_fixture() -> ScriptedClient {
    let mut client = ScriptedClient {
        repos: vec![repo(41, "alpha"), repo(42, "beta")],
        ..Default::default()
    };
    client.pulls.insert(
        "alpha".into(),
        vec![
            // open
            pull(9001, 1, 41, 7, "alice", None, None),
            // merged
            pull(
                9002,
                2,
                41,
                7,
                "alice",
                Some("2025-05-02T12:00:00Z"),
                Some("2025-05-02T12:00:00Z"),
            ),
            // closed without merge
            pull(9003, 3, 41, 8, "bob", Some("2025-05-03T12:00:00Z"), None),
        ],
    );
    client
}

#[tokio::test]
async fn collects_two_repositories_and_three_pull_requests() {
    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(config(), Arc::new(three_pull_fixture()), stores.clone());

    let summary = collector.run().await;

    assert!(summary.success, "run failed: {:?}", summary.error);
    assert_eq!(summary.repositories_count, 2);
    assert_eq!(summary.pull_requests_count, 3);
    assert_eq!(summary.reviews_count, 0);
    assert!(summary.error.is_none());

    // one open, one merged, one closed-unmerged
    let repo_row = stores
        .repositories()
        .find_by_github_id("41")
        .await
        .unwrap()
        .unwrap();
    let rows = stores
        .pull_requests()
        .list_by_repository(repo_row.id, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].is_open() && !rows[0].is_merged());
    assert!(!rows[1].is_open() && rows[1].is_merged());
    assert!(!rows[2].is_open() && !rows[2].is_merged());

    // authors deduplicated into shallow rows
    let users = stores.users().list(10).await.unwrap();
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn rate_limited_repository_is_skipped_but_the_run_succeeds() {
    let mut client = three_pull_fixture();
    client.pull_errors.insert("alpha".into());
    client
        .pulls
        .insert("beta".into(), vec![pull(9010, 1, 42, 8, "bob", None, None)]);

    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(config(), Arc::new(client), stores.clone());

    let summary = collector.run().await;

    assert!(summary.success);
    assert_eq!(summary.repositories_count, 2);
    // only repo beta contributed pull requests
    assert_eq!(summary.pull_requests_count, 1);
    let beta = stores
        .repositories()
        .find_by_github_id("42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stores
            .pull_requests()
            .count_by_repository(beta.id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn failing_the_repository_listing_fails_the_run() {
    let client = ScriptedClient {
        fail_repo_listing: true,
        ..Default::default()
    };
    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(config(), Arc::new(client), stores);

    let summary = collector.run().await;

    assert!(!summary.success);
    assert_eq!(summary.repositories_count, 0);
    let message = summary.error.expect("error text");
    assert!(message.contains("listing organization repositories"));
}

#[tokio::test]
async fn a_record_missing_base_is_skipped_without_blocking_the_page() {
    let mut client = ScriptedClient {
        repos: vec![repo(41, "alpha")],
        ..Default::default()
    };
    let mut broken = pull(9001, 1, 41, 7, "alice", None, None);
    broken.as_object_mut().unwrap().remove("base");
    client.pulls.insert(
        "alpha".into(),
        vec![broken, pull(9002, 2, 41, 7, "alice", None, None)],
    );

    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(config(), Arc::new(client), stores.clone());

    let summary = collector.run().await;

    assert!(summary.success);
    assert_eq!(summary.pull_requests_count, 1);
    assert_eq!(
        stores
            .pull_requests()
            .find_by_github_id("9002")
            .await
            .unwrap()
            .unwrap()
            .number,
        2
    );
}

#[tokio::test]
async fn reviews_are_collected_and_reviewers_share_user_rows() {
    let mut client = three_pull_fixture();
    client.reviews.insert(
        ("alpha".into(), 1),
        vec![
            review(100, 8, "bob", "APPROVED"),
            // reviewer reference missing: skipped, page continues
            json!({"id": 101, "state": "COMMENTED", "submitted_at": null}),
            review(102, 7, "alice", "CHANGES_REQUESTED"),
        ],
    );

    let mut cfg = config();
    cfg.include_reviews = true;
    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(cfg, Arc::new(client), stores.clone());

    let summary = collector.run().await;

    assert!(summary.success);
    assert_eq!(summary.reviews_count, 2);

    let approved = stores
        .reviews()
        .find_by_github_id("100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.state, "approved");
    assert!(approved.is_submitted());

    // bob already exists as a pull request author; reviewing must not
    // duplicate the row
    let users = stores.users().list(10).await.unwrap();
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn repeated_runs_upsert_instead_of_duplicating() {
    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(config(), Arc::new(three_pull_fixture()), stores.clone());

    let first = collector.run().await;
    let second = collector.run().await;

    assert!(first.success && second.success);
    // counts tally persisted records each run, rows do not multiply
    assert_eq!(second.pull_requests_count, 3);
    assert_eq!(stores.repositories().list(10).await.unwrap().len(), 2);
    let alpha = stores
        .repositories()
        .find_by_github_id("41")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stores
            .pull_requests()
            .count_by_repository(alpha.id)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn user_profiles_are_enriched_and_vanished_users_skipped() {
    let mut client = three_pull_fixture();
    client.users.insert(
        "alice".into(),
        json!({
            "id": 7,
            "login": "alice",
            "name": "Alice Doe",
            "company": "Acme",
            "followers": 20,
            "following": 3,
            "public_repos": 9,
            "created_at": "2015-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }),
    );
    // bob intentionally absent upstream

    let mut cfg = config();
    cfg.include_user_profiles = true;
    let stores: Arc<dyn Stores> = Arc::new(MemoryStores::new());
    let collector = Collector::new(cfg, Arc::new(client), stores.clone());

    let summary = collector.run().await;

    assert!(summary.success);
    assert_eq!(summary.users_count, 1);

    let alice = stores
        .users()
        .find_by_login("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.github_id, "7");
    assert_eq!(alice.name.as_deref(), Some("Alice Doe"));
    assert_eq!(alice.followers, Some(20));

    let bob = stores.users().find_by_login("bob").await.unwrap().unwrap();
    assert!(bob.name.is_none());
}
