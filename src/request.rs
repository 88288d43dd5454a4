//! Request orchestration: turns fetches into dispatched cache actions.
//!
//! Every request follows the same lifecycle per key:
//!
//! ```text
//! IDLE --_REQUEST--> PENDING --_SUCCESS | _FAILURE--> IDLE
//! ```
//!
//! Errors never escape: they are dispatched as `_FAILURE` actions so the
//! in-flight flag always resolves.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::cache::{Action, Dispatch, Query};
use crate::client::{Fetch, FetchError};
use crate::record::{PageCount, Record};
use crate::resource::ResourceKind;

pub(crate) const METRIC_FETCH_TOTAL: &str = "wpqc_fetch_total";
pub(crate) const METRIC_FETCH_FAILURE_TOTAL: &str = "wpqc_fetch_failure_total";
pub(crate) const METRIC_PAGE_COUNT_FALLBACK_TOTAL: &str = "wpqc_page_count_fallback_total";
pub(crate) const METRIC_FETCH_MS: &str = "wpqc_fetch_ms";

const EMBED_PARAM: &str = "_embed";
const SLUG_PARAM: &str = "slug";
const MODE_COLLECTION: &str = "collection";
const MODE_SINGLE: &str = "single";

/// Issues collection and single-record fetches for one resource kind.
pub struct Requester {
    kind: Arc<ResourceKind>,
    dispatch: Arc<dyn Dispatch>,
    fetch: Arc<dyn Fetch>,
}

impl Requester {
    pub fn new(kind: Arc<ResourceKind>, dispatch: Arc<dyn Dispatch>, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            kind,
            dispatch,
            fetch,
        }
    }

    pub fn kind(&self) -> &Arc<ResourceKind> {
        &self.kind
    }

    /// Dispatch `COLLECTION_REQUEST` now and fetch in a background task.
    ///
    /// Returns `None` without dispatching anything when called outside a
    /// Tokio runtime, so no in-flight flag is left set.
    pub fn request_collection(self: &Arc<Self>, query: Query) -> Option<JoinHandle<()>> {
        let runtime = self.runtime(MODE_COLLECTION)?;
        self.dispatch.dispatch(Action::CollectionRequest {
            query: query.clone(),
        });
        let requester = Arc::clone(self);
        Some(runtime.spawn(async move { requester.fetch_collection(query).await }))
    }

    /// Dispatch `SINGLE_REQUEST` now and fetch in a background task.
    ///
    /// Returns `None` without dispatching anything when called outside a
    /// Tokio runtime.
    pub fn request_single(self: &Arc<Self>, slug: String) -> Option<JoinHandle<()>> {
        let runtime = self.runtime(MODE_SINGLE)?;
        self.dispatch.dispatch(Action::SingleRequest { slug: slug.clone() });
        let requester = Arc::clone(self);
        Some(runtime.spawn(async move { requester.fetch_single(slug).await }))
    }

    fn runtime(&self, mode: &'static str) -> Option<Handle> {
        match Handle::try_current() {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(
                    resource = self.kind.name(),
                    mode,
                    error = %err,
                    "No async runtime; request skipped"
                );
                None
            }
        }
    }

    /// Run a whole collection request on the current task.
    pub async fn collection(&self, query: Query) {
        self.dispatch.dispatch(Action::CollectionRequest {
            query: query.clone(),
        });
        self.fetch_collection(query).await;
    }

    /// Run a whole single-record request on the current task.
    pub async fn single(&self, slug: String) {
        self.dispatch.dispatch(Action::SingleRequest { slug: slug.clone() });
        self.fetch_single(slug).await;
    }

    #[instrument(skip(self, query), fields(resource = %self.kind.name()))]
    async fn fetch_collection(&self, query: Query) {
        let started = self.record_start(MODE_COLLECTION);

        let mut params = query.clone();
        params.insert(EMBED_PARAM.to_owned(), Value::Bool(true));

        let records = match self.fetch_records(&params).await {
            Ok(records) => records,
            Err(error) => {
                self.record_failure(MODE_COLLECTION, &error);
                self.dispatch.dispatch(Action::CollectionRequestFailure {
                    query,
                    error: Arc::new(error),
                });
                return;
            }
        };

        self.dispatch.dispatch(Action::BatchReceive {
            records: records.clone(),
        });

        let total_pages = match self.fetch.total_pages(self.kind.path(), &params).await {
            Ok(count) => count,
            Err(error) => {
                warn!(
                    resource = self.kind.name(),
                    error = %error,
                    "Page count fetch failed; assuming a single page"
                );
                counter!(METRIC_PAGE_COUNT_FALLBACK_TOTAL, "resource" => self.kind.name().to_owned())
                    .increment(1);
                PageCount::default()
            }
        };

        self.record_latency(MODE_COLLECTION, started);
        debug!(
            resource = self.kind.name(),
            count = records.len(),
            total_pages = ?total_pages,
            "Collection fetched"
        );
        self.dispatch.dispatch(Action::CollectionRequestSuccess {
            query,
            total_pages,
            records,
        });
    }

    #[instrument(skip(self), fields(resource = %self.kind.name()))]
    async fn fetch_single(&self, slug: String) {
        let started = self.record_start(MODE_SINGLE);

        let mut params = Query::new();
        params.insert(SLUG_PARAM.to_owned(), Value::String(slug.clone()));
        params.insert(EMBED_PARAM.to_owned(), Value::Bool(true));

        let result = self.fetch_records(&params).await.and_then(|records| {
            records
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::not_found(slug.as_str()))
        });

        match result {
            Ok(record) => {
                self.record_latency(MODE_SINGLE, started);
                let id = record.id();
                self.dispatch.dispatch(Action::BatchReceive {
                    records: vec![record],
                });
                self.dispatch
                    .dispatch(Action::SingleRequestSuccess { id, slug });
            }
            Err(error) => {
                self.record_failure(MODE_SINGLE, &error);
                self.dispatch.dispatch(Action::SingleRequestFailure {
                    slug,
                    error: Arc::new(error),
                });
            }
        }
    }

    async fn fetch_records(&self, params: &Query) -> Result<Vec<Arc<Record>>, FetchError> {
        let values = self.fetch.get(self.kind.path(), params).await?;
        values
            .into_iter()
            .map(|value| Record::from_value(value, self.kind.shape()).map(Arc::new))
            .collect()
    }

    fn record_start(&self, mode: &'static str) -> Instant {
        counter!(METRIC_FETCH_TOTAL, "resource" => self.kind.name().to_owned(), "mode" => mode)
            .increment(1);
        Instant::now()
    }

    fn record_latency(&self, mode: &'static str, started: Instant) {
        histogram!(METRIC_FETCH_MS, "resource" => self.kind.name().to_owned(), "mode" => mode)
            .record(started.elapsed().as_secs_f64() * 1000.0);
    }

    fn record_failure(&self, mode: &'static str, error: &FetchError) {
        warn!(resource = self.kind.name(), mode, error = %error, "Fetch failed");
        counter!(
            METRIC_FETCH_FAILURE_TOTAL,
            "resource" => self.kind.name().to_owned(),
            "mode" => mode
        )
        .increment(1);
    }
}
