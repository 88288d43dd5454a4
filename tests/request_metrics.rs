use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::{Value, json};
use wp_query_cache::{Fetch, FetchError, PageCount, Query, Resource, ResourceKind};

/// Serves one page on the first GET, then fails; page counts always fail.
#[derive(Default)]
struct FlakyFetch {
    served: AtomicBool,
}

#[async_trait]
impl Fetch for FlakyFetch {
    async fn get(&self, _path: &str, _query: &Query) -> Result<Vec<Value>, FetchError> {
        if self.served.swap(true, Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(vec![json!({"id": 1, "slug": "first"})])
    }

    async fn total_pages(&self, _path: &str, _query: &Query) -> Result<PageCount, FetchError> {
        Err(FetchError::Status {
            status: 500,
            body: String::new(),
        })
    }
}

#[tokio::test]
async fn request_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let resource = Resource::new(
        Arc::new(ResourceKind::events_at(1_700_000_000_000)),
        Arc::new(FlakyFetch::default()),
    );

    // Page one succeeds with a page-count fallback, page two fails.
    let mut page = Query::new();
    page.insert("paged".into(), json!(1));
    resource.requester().collection(page.clone()).await;
    page.insert("paged".into(), json!(2));
    resource.requester().collection(page).await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "wpqc_fetch_total",
        "wpqc_fetch_failure_total",
        "wpqc_page_count_fallback_total",
        "wpqc_fetch_ms",
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
