//! Entity kinds served through the cache.
//!
//! A [`ResourceKind`] carries everything that differs between entity kinds:
//! the REST path, the default query table used for key normalization and the
//! record field names. [`Resource`] wires one kind to its store and requester.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::cache::{Query, Store, serialize_query};
use crate::client::Fetch;
use crate::request::Requester;

pub const EVENTS: &str = "events";
pub const USERS: &str = "users";

const DEFAULT_ID_FIELD: &str = "id";
const DEFAULT_SLUG_FIELD: &str = "slug";

/// Names of the identifier and slug fields in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    id_field: String,
    slug_field: String,
}

impl RecordShape {
    pub fn new(id_field: impl Into<String>, slug_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            slug_field: slug_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn slug_field(&self) -> &str {
        &self.slug_field
    }
}

impl Default for RecordShape {
    fn default() -> Self {
        Self::new(DEFAULT_ID_FIELD, DEFAULT_SLUG_FIELD)
    }
}

/// Configuration of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceKind {
    name: String,
    path: String,
    defaults: Query,
    shape: RecordShape,
}

impl ResourceKind {
    pub fn new(name: impl Into<String>, path: impl Into<String>, defaults: Query) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            defaults,
            shape: RecordShape::default(),
        }
    }

    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }

    /// Events, with the end-date filter stamped at the current time.
    pub fn events() -> Self {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self::events_at(i64::try_from(now_ms).unwrap_or(i64::MAX))
    }

    /// Events, with the end-date filter stamped at `now_ms` (Unix millis).
    pub fn events_at(now_ms: i64) -> Self {
        Self::new(
            EVENTS,
            "/wp/v2/events",
            default_table(json!({
                "number": 10,
                "offset": 0,
                "role": "Subscriber",
                "order_by": "meta_value",
                "meta_key": "events_startdate",
                "meta_query": {
                    "key": "events_enddate",
                    "compare": "<=",
                    "value": now_ms,
                },
                "order": "ASC",
                "fields": "all_with_meta",
            })),
        )
    }

    pub fn users() -> Self {
        Self::new(
            USERS,
            "/wp/v2/users",
            default_table(json!({
                "number": 10,
                "offset": 0,
                "role": "Subscriber",
                "order_by": "display_name",
                "order": "ASC",
                "fields": "all_with_meta",
            })),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn defaults(&self) -> &Query {
        &self.defaults
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    /// Cache key for `query` under this kind's defaults.
    pub fn query_key(&self, query: Option<&Query>) -> String {
        serialize_query(query, &self.defaults)
    }
}

fn default_table(value: Value) -> Query {
    match value {
        Value::Object(map) => map,
        _ => Query::new(),
    }
}

/// Lookup of entity kinds by name.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    kinds: BTreeMap<String, Arc<ResourceKind>>,
}

impl ResourceRegistry {
    /// Registry holding the built-in `events` and `users` kinds.
    pub fn builtin() -> Self {
        let mut registry = Self {
            kinds: BTreeMap::new(),
        };
        registry.insert(ResourceKind::events());
        registry.insert(ResourceKind::users());
        registry
    }

    /// Add or replace a kind.
    pub fn insert(&mut self, kind: ResourceKind) {
        self.kinds.insert(kind.name().to_owned(), Arc::new(kind));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceKind>> {
        self.kinds.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One entity kind wired to its cache store and requester.
#[derive(Clone)]
pub struct Resource {
    store: Arc<Store>,
    requester: Arc<Requester>,
}

impl Resource {
    pub fn new(kind: Arc<ResourceKind>, fetch: Arc<dyn Fetch>) -> Self {
        let store = Arc::new(Store::new(Arc::clone(&kind)));
        let requester = Arc::new(Requester::new(kind, store.clone(), fetch));
        Self { store, requester }
    }

    pub fn kind(&self) -> &Arc<ResourceKind> {
        self.store.kind()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn requester(&self) -> &Arc<Requester> {
        &self.requester
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_events_and_users() {
        let registry = ResourceRegistry::builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec![EVENTS, USERS]);

        let events = registry.get(EVENTS).expect("events kind");
        assert_eq!(events.path(), "/wp/v2/events");
        assert!(registry.get("posts").is_none());
    }

    #[test]
    fn events_defaults_carry_end_date_filter() {
        let events = ResourceKind::events_at(1_700_000_000_000);
        let meta_query = events.defaults().get("meta_query").expect("meta_query");
        assert_eq!(meta_query["value"], json!(1_700_000_000_000_i64));
        assert_eq!(events.defaults()["order_by"], json!("meta_value"));
    }

    #[test]
    fn insert_replaces_existing_kind() {
        let mut registry = ResourceRegistry::builtin();
        registry.insert(ResourceKind::new(USERS, "/custom/users", Query::new()));
        let users = registry.get(USERS).expect("users kind");
        assert_eq!(users.path(), "/custom/users");
        assert!(users.defaults().is_empty());
    }

    #[test]
    fn query_key_drops_kind_defaults() {
        let users = ResourceKind::users();
        let query = default_table(json!({"number": 10, "search": "Ada"}));
        assert_eq!(users.query_key(Some(&query)), r#"{"search":"ada"}"#);
        assert_eq!(users.query_key(None), "{}");
    }
}
