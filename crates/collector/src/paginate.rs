use std::future::Future;

use gh_client::ApiError;
use serde_json::Value;
use tracing::{debug, error};

/// Hard stop against unbounded or misbehaving upstream pagination.
pub const PAGE_SAFETY_CEILING: u32 = 1000;

/// Drive `fetch` across pages 1, 2, … until an empty page, `max_pages`, or
/// the safety ceiling. Items come back in first-page-first order; duplicates
/// across pages are left for the idempotent upsert downstream.
pub async fn fetch_all_pages<F, Fut>(
    label: &str,
    max_pages: u32,
    mut fetch: F,
) -> Result<Vec<Value>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, ApiError>>,
{
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
        if page > max_pages {
            debug!(label, max_pages, "reached configured page limit");
            break;
        }
        if page > PAGE_SAFETY_CEILING {
            error!(
                label,
                ceiling = PAGE_SAFETY_CEILING,
                "pagination safety ceiling reached; upstream did not terminate"
            );
            break;
        }

        let batch = fetch(page).await?;
        if batch.is_empty() {
            break;
        }
        debug!(label, page, count = batch.len(), "fetched page");
        items.extend(batch);
        page += 1;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_at_the_first_empty_page() {
        let calls = AtomicU32::new(0);
        let items = fetch_all_pages("repos", 10, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if page <= 2 {
                    Ok(vec![json!({"page": page})])
                } else {
                    Ok(vec![])
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(items[0]["page"], 1);
    }

    #[tokio::test]
    async fn respects_the_configured_page_limit() {
        let calls = AtomicU32::new(0);
        let items = fetch_all_pages("pulls", 3, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![json!({"page": page})]) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn safety_ceiling_bounds_a_non_terminating_upstream() {
        let items = fetch_all_pages("repos", u32::MAX, |_page| async move {
            Ok(vec![json!({"id": 1})])
        })
        .await
        .unwrap();

        assert_eq!(items.len(), PAGE_SAFETY_CEILING as usize);
    }

    #[tokio::test]
    async fn a_failing_page_propagates() {
        let result = fetch_all_pages("repos", 10, |page| async move {
            if page == 2 {
                Err(ApiError::NotFound {
                    endpoint: "orgs/acme/repos".into(),
                })
            } else {
                Ok(vec![json!({"page": page})])
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::NotFound { .. })));
    }
}
