//! Messages that drive the cache reducers.

use std::sync::Arc;

use crate::client::FetchError;
use crate::record::{PageCount, Record, RecordId};

use super::keys::Query;

/// A tagged message dispatched into a resource store.
#[derive(Debug, Clone)]
pub enum Action {
    /// A single-record fetch started.
    SingleRequest { slug: String },
    /// A single-record fetch resolved to `id`.
    SingleRequestSuccess { id: RecordId, slug: String },
    /// A single-record fetch failed.
    SingleRequestFailure {
        slug: String,
        error: Arc<FetchError>,
    },
    /// Records arrived from any fetch.
    BatchReceive { records: Vec<Arc<Record>> },
    /// A collection fetch started.
    CollectionRequest { query: Query },
    /// A collection fetch completed.
    CollectionRequestSuccess {
        query: Query,
        total_pages: PageCount,
        records: Vec<Arc<Record>>,
    },
    /// A collection fetch failed.
    CollectionRequestFailure {
        query: Query,
        error: Arc<FetchError>,
    },
}

impl Action {
    /// Stable string tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SingleRequest { .. } => "SINGLE_REQUEST",
            Self::SingleRequestSuccess { .. } => "SINGLE_REQUEST_SUCCESS",
            Self::SingleRequestFailure { .. } => "SINGLE_REQUEST_FAILURE",
            Self::BatchReceive { .. } => "BATCH_RECEIVE",
            Self::CollectionRequest { .. } => "COLLECTION_REQUEST",
            Self::CollectionRequestSuccess { .. } => "COLLECTION_REQUEST_SUCCESS",
            Self::CollectionRequestFailure { .. } => "COLLECTION_REQUEST_FAILURE",
        }
    }

    /// Whether this message ends a request (success or failure).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SingleRequestSuccess { .. }
                | Self::SingleRequestFailure { .. }
                | Self::CollectionRequestSuccess { .. }
                | Self::CollectionRequestFailure { .. }
        )
    }
}
