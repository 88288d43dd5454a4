//! Normalized, query-keyed cache of WordPress REST resources.
//!
//! Records fetched through any query are stored once by id. Collection
//! queries map to ordered id lists and page counts under a canonical query
//! key, and slugs resolve to ids. [`request::Requester`] drives fetches
//! through the [`cache::Store`]; [`binding::QueryBinding`] decides when a
//! declared data need should trigger one.

pub mod binding;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod record;
pub mod request;
pub mod resource;
pub mod telemetry;

pub use binding::{BindingProps, QueryBinding, QuerySource};
pub use cache::{Action, Dispatch, Query, Store};
pub use client::{Fetch, FetchError, WpClient};
pub use record::{PageCount, Record, RecordId};
pub use request::Requester;
pub use resource::{Resource, ResourceKind, ResourceRegistry};
