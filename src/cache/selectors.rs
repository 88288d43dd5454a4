//! Read-only projections of a [`CacheState`].
//!
//! Every accessor is total: missing data yields a fixed default instead of an
//! error.

use std::sync::Arc;

use crate::record::{Record, RecordId};
use crate::resource::ResourceKind;

use super::keys::Query;
use super::reducer::CacheState;

const DEFAULT_TOTAL_PAGES: u64 = 1;

/// The record with `id`, if it has been received.
pub fn get_by_id(state: &CacheState, id: RecordId) -> Option<Arc<Record>> {
    state.items.get(&id).cloned()
}

/// Records for `query` in server order.
///
/// `None` when the query has never completed; an empty list when it completed
/// with no results. Ids that no longer resolve to a record are skipped.
pub fn get_for_query(
    state: &CacheState,
    kind: &ResourceKind,
    query: Option<&Query>,
) -> Option<Vec<Arc<Record>>> {
    let ids = state.queries.get(&kind.query_key(query))?;
    Some(ids.iter().filter_map(|id| get_by_id(state, *id)).collect())
}

/// Whether a single-record fetch for `slug` is in flight.
pub fn is_requesting_single(state: &CacheState, slug: &str) -> bool {
    state.requests.get(slug).copied().unwrap_or(false)
}

/// Whether a collection fetch for `query` is in flight.
pub fn is_requesting_for_query(
    state: &CacheState,
    kind: &ResourceKind,
    query: Option<&Query>,
) -> bool {
    state
        .query_requests
        .get(&kind.query_key(query))
        .copied()
        .unwrap_or(false)
}

/// Number of pages available for `query`; 1 when unknown.
pub fn total_pages_for_query(state: &CacheState, kind: &ResourceKind, query: Option<&Query>) -> u64 {
    state
        .total_pages
        .get(&kind.query_key(query))
        .and_then(|count| count.parse())
        .unwrap_or(DEFAULT_TOTAL_PAGES)
}

/// Record id for `slug`. `None` means not found.
pub fn id_from_slug(state: &CacheState, slug: &str) -> Option<RecordId> {
    state.slugs.get(slug).copied().filter(|id| *id != 0)
}
