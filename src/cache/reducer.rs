//! Pure reducers for the normalized resource cache.
//!
//! Each mapping is held behind an `Arc` and replaced wholesale: a reducer
//! either hands back the same `Arc` (message not relevant) or a fresh copy
//! with the update applied. Earlier snapshots are never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use crate::record::{PageCount, Record, RecordId};
use crate::resource::ResourceKind;

use super::actions::Action;

pub type Items = HashMap<RecordId, Arc<Record>>;
pub type Flags = HashMap<String, bool>;
pub type QueryResults = HashMap<String, Vec<RecordId>>;
pub type PageCounts = HashMap<String, PageCount>;
pub type Slugs = HashMap<String, RecordId>;

/// Snapshot of one resource's cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    /// Known records by id.
    pub items: Arc<Items>,
    /// Single-record fetches in flight, by slug.
    pub requests: Arc<Flags>,
    /// Collection fetches in flight, by query key.
    pub query_requests: Arc<Flags>,
    /// Result ids per query key, in server order.
    pub queries: Arc<QueryResults>,
    /// Page count per query key.
    pub total_pages: Arc<PageCounts>,
    /// Record id per slug.
    pub slugs: Arc<Slugs>,
}

/// Apply `action` to every mapping of `state`.
pub fn reduce(state: &CacheState, action: &Action, kind: &ResourceKind) -> CacheState {
    CacheState {
        items: items(&state.items, action),
        requests: requests(&state.requests, action),
        query_requests: query_requests(&state.query_requests, action, kind),
        queries: queries(&state.queries, action, kind),
        total_pages: total_pages(&state.total_pages, action, kind),
        slugs: slugs(&state.slugs, action),
    }
}

/// Tracks every received record by id.
pub fn items(state: &Arc<Items>, action: &Action) -> Arc<Items> {
    match action {
        Action::BatchReceive { records } => updated(state, |items| {
            for record in records {
                items.insert(record.id(), Arc::clone(record));
            }
        }),
        Action::SingleRequest { .. }
        | Action::SingleRequestSuccess { .. }
        | Action::SingleRequestFailure { .. }
        | Action::CollectionRequest { .. }
        | Action::CollectionRequestSuccess { .. }
        | Action::CollectionRequestFailure { .. } => Arc::clone(state),
    }
}

/// Tracks whether a single-record fetch is in flight for a slug.
pub fn requests(state: &Arc<Flags>, action: &Action) -> Arc<Flags> {
    match action {
        Action::SingleRequest { slug } => set_flag(state, slug.clone(), true),
        Action::SingleRequestSuccess { slug, .. } | Action::SingleRequestFailure { slug, .. } => {
            set_flag(state, slug.clone(), false)
        }
        Action::BatchReceive { .. }
        | Action::CollectionRequest { .. }
        | Action::CollectionRequestSuccess { .. }
        | Action::CollectionRequestFailure { .. } => Arc::clone(state),
    }
}

/// Tracks whether a collection fetch is in flight for a query key.
pub fn query_requests(state: &Arc<Flags>, action: &Action, kind: &ResourceKind) -> Arc<Flags> {
    match action {
        Action::CollectionRequest { query } => set_flag(state, kind.query_key(Some(query)), true),
        Action::CollectionRequestSuccess { query, .. }
        | Action::CollectionRequestFailure { query, .. } => {
            set_flag(state, kind.query_key(Some(query)), false)
        }
        Action::SingleRequest { .. }
        | Action::SingleRequestSuccess { .. }
        | Action::SingleRequestFailure { .. }
        | Action::BatchReceive { .. } => Arc::clone(state),
    }
}

/// Records the ordered result ids of each successful collection fetch.
pub fn queries(
    state: &Arc<QueryResults>,
    action: &Action,
    kind: &ResourceKind,
) -> Arc<QueryResults> {
    match action {
        Action::CollectionRequestSuccess { query, records, .. } => {
            let key = kind.query_key(Some(query));
            let ids = records.iter().map(|record| record.id()).collect();
            updated(state, |queries| {
                queries.insert(key, ids);
            })
        }
        Action::SingleRequest { .. }
        | Action::SingleRequestSuccess { .. }
        | Action::SingleRequestFailure { .. }
        | Action::BatchReceive { .. }
        | Action::CollectionRequest { .. }
        | Action::CollectionRequestFailure { .. } => Arc::clone(state),
    }
}

/// Records the page count of each successful collection fetch.
pub fn total_pages(
    state: &Arc<PageCounts>,
    action: &Action,
    kind: &ResourceKind,
) -> Arc<PageCounts> {
    match action {
        Action::CollectionRequestSuccess {
            query, total_pages, ..
        } => {
            let key = kind.query_key(Some(query));
            updated(state, |pages| {
                pages.insert(key, total_pages.clone());
            })
        }
        Action::SingleRequest { .. }
        | Action::SingleRequestSuccess { .. }
        | Action::SingleRequestFailure { .. }
        | Action::BatchReceive { .. }
        | Action::CollectionRequest { .. }
        | Action::CollectionRequestFailure { .. } => Arc::clone(state),
    }
}

/// Tracks the slug → id mapping from single fetches and received batches.
pub fn slugs(state: &Arc<Slugs>, action: &Action) -> Arc<Slugs> {
    match action {
        Action::SingleRequestSuccess { id, slug } => updated(state, |slugs| {
            slugs.insert(slug.clone(), *id);
        }),
        Action::BatchReceive { records } => updated(state, |slugs| {
            for record in records {
                if let Some(slug) = record.slug() {
                    slugs.insert(slug.to_owned(), record.id());
                }
            }
        }),
        Action::SingleRequest { .. }
        | Action::SingleRequestFailure { .. }
        | Action::CollectionRequest { .. }
        | Action::CollectionRequestSuccess { .. }
        | Action::CollectionRequestFailure { .. } => Arc::clone(state),
    }
}

fn updated<T: Clone>(state: &Arc<T>, apply: impl FnOnce(&mut T)) -> Arc<T> {
    let mut next = T::clone(state);
    apply(&mut next);
    Arc::new(next)
}

fn set_flag(state: &Arc<Flags>, key: String, value: bool) -> Arc<Flags> {
    updated(state, |flags| {
        flags.insert(key, value);
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::keys::Query;
    use crate::client::FetchError;
    use crate::resource::RecordShape;

    fn kind() -> ResourceKind {
        ResourceKind::users()
    }

    fn record(value: Value) -> Arc<Record> {
        Arc::new(Record::from_value(value, &RecordShape::default()).expect("record"))
    }

    fn paged(page: u64) -> Query {
        let mut query = Query::new();
        query.insert("paged".into(), json!(page));
        query
    }

    fn batch() -> Vec<Arc<Record>> {
        vec![
            record(json!({"id": 2, "slug": "ada"})),
            record(json!({"id": 5, "slug": "grace"})),
        ]
    }

    fn failure() -> Arc<FetchError> {
        Arc::new(FetchError::decode("bad body"))
    }

    #[test]
    fn initial_state_is_empty() {
        let state = CacheState::default();
        assert!(state.items.is_empty());
        assert!(state.requests.is_empty());
        assert!(state.query_requests.is_empty());
        assert!(state.queries.is_empty());
        assert!(state.total_pages.is_empty());
        assert!(state.slugs.is_empty());
    }

    #[test]
    fn items_stores_received_records_by_id() {
        let state = items(&Arc::default(), &Action::BatchReceive { records: batch() });
        assert_eq!(state.len(), 2);
        assert_eq!(state[&5].slug(), Some("grace"));
    }

    #[test]
    fn items_adds_onto_existing_records_and_overwrites_by_id() {
        let before = items(&Arc::default(), &Action::BatchReceive { records: batch() });
        let replacement = record(json!({"id": 2, "slug": "ada-lovelace"}));
        let extra = record(json!({"id": 9, "slug": "linus"}));

        let next = items(
            &before,
            &Action::BatchReceive {
                records: vec![replacement, extra],
            },
        );

        assert_eq!(next.len(), 3);
        assert_eq!(next[&2].slug(), Some("ada-lovelace"));
        assert_eq!(before[&2].slug(), Some("ada"));
    }

    #[test]
    fn unrelated_actions_return_the_same_mapping() {
        let state: Arc<Items> = Arc::default();
        let next = items(&state, &Action::SingleRequest { slug: "x".into() });
        assert!(Arc::ptr_eq(&state, &next));

        let flags: Arc<Flags> = Arc::default();
        let next = requests(&flags, &Action::BatchReceive { records: batch() });
        assert!(Arc::ptr_eq(&flags, &next));
    }

    #[test]
    fn query_requests_tracks_lifecycle() {
        let kind = kind();
        let pending = query_requests(
            &Arc::default(),
            &Action::CollectionRequest { query: paged(1) },
            &kind,
        );
        assert_eq!(pending.get(r#"{"paged":1}"#), Some(&true));

        let done = query_requests(
            &pending,
            &Action::CollectionRequestSuccess {
                query: paged(1),
                total_pages: PageCount::default(),
                records: vec![],
            },
            &kind,
        );
        assert_eq!(done.get(r#"{"paged":1}"#), Some(&false));

        let failed = query_requests(
            &pending,
            &Action::CollectionRequestFailure {
                query: paged(1),
                error: failure(),
            },
            &kind,
        );
        assert_eq!(failed.get(r#"{"paged":1}"#), Some(&false));
    }

    #[test]
    fn query_requests_tracks_additional_queries() {
        let kind = kind();
        let first = query_requests(
            &Arc::default(),
            &Action::CollectionRequestFailure {
                query: paged(1),
                error: failure(),
            },
            &kind,
        );
        let second = query_requests(&first, &Action::CollectionRequest { query: paged(2) }, &kind);

        assert_eq!(second.get(r#"{"paged":1}"#), Some(&false));
        assert_eq!(second.get(r#"{"paged":2}"#), Some(&true));
    }

    #[test]
    fn requests_tracks_single_lifecycle() {
        let pending = requests(&Arc::default(), &Action::SingleRequest { slug: "ada".into() });
        assert_eq!(pending.get("ada"), Some(&true));

        let failed = requests(
            &pending,
            &Action::SingleRequestFailure {
                slug: "ada".into(),
                error: failure(),
            },
        );
        assert_eq!(failed.get("ada"), Some(&false));

        let done = requests(
            &pending,
            &Action::SingleRequestSuccess {
                id: 2,
                slug: "ada".into(),
            },
        );
        assert_eq!(done.get("ada"), Some(&false));
    }

    #[test]
    fn queries_records_ordered_ids_and_overwrites() {
        let kind = kind();
        let first = queries(
            &Arc::default(),
            &Action::CollectionRequestSuccess {
                query: paged(1),
                total_pages: PageCount::default(),
                records: batch(),
            },
            &kind,
        );
        assert_eq!(first.get(r#"{"paged":1}"#), Some(&vec![2, 5]));

        let second = queries(
            &first,
            &Action::CollectionRequestSuccess {
                query: paged(1),
                total_pages: PageCount::default(),
                records: vec![record(json!({"id": 7}))],
            },
            &kind,
        );
        assert_eq!(second.get(r#"{"paged":1}"#), Some(&vec![7]));
    }

    #[test]
    fn total_pages_records_count_per_query() {
        let kind = kind();
        let state = total_pages(
            &Arc::default(),
            &Action::CollectionRequestSuccess {
                query: paged(1),
                total_pages: PageCount::from(3_u64),
                records: vec![],
            },
            &kind,
        );
        assert_eq!(state.get(r#"{"paged":1}"#), Some(&PageCount::Number(3)));
    }

    #[test]
    fn slugs_come_from_single_success_and_batches() {
        let single = slugs(
            &Arc::default(),
            &Action::SingleRequestSuccess {
                id: 7,
                slug: "acme".into(),
            },
        );
        assert_eq!(single.get("acme"), Some(&7));

        let mut records = batch();
        records.push(record(json!({"id": 11})));
        let batched = slugs(&single, &Action::BatchReceive { records });
        assert_eq!(batched.len(), 3);
        assert_eq!(batched.get("grace"), Some(&5));
    }

    #[test]
    fn applying_success_twice_matches_applying_once() {
        let kind = kind();
        let success = Action::CollectionRequestSuccess {
            query: paged(1),
            total_pages: PageCount::from(2_u64),
            records: batch(),
        };
        let pending = reduce(
            &CacheState::default(),
            &Action::CollectionRequest { query: paged(1) },
            &kind,
        );

        let once = reduce(&pending, &success, &kind);
        let twice = reduce(&once, &success, &kind);
        assert_eq!(once, twice);
    }

    #[test]
    fn reduce_leaves_the_previous_snapshot_untouched() {
        let kind = kind();
        let before = CacheState::default();
        let after = reduce(&before, &Action::BatchReceive { records: batch() }, &kind);

        assert!(before.items.is_empty());
        assert_eq!(after.items.len(), 2);
        assert!(Arc::ptr_eq(&before.requests, &after.requests));
        assert!(Arc::ptr_eq(&before.queries, &after.queries));
    }
}
