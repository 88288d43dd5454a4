//! Normalized client-side cache for REST resources.
//!
//! Each resource kind gets one [`Store`] holding six mappings:
//!
//! - `items`: record id → record
//! - `requests`: slug → single fetch in flight
//! - `query_requests`: query key → collection fetch in flight
//! - `queries`: query key → ordered result ids
//! - `total_pages`: query key → page count
//! - `slugs`: slug → record id
//!
//! The mappings only change through [`Action`]s run by the pure reducers in
//! [`reducer`]; [`selectors`] project them into answers.

mod actions;
mod keys;
pub mod reducer;
pub mod selectors;
mod store;

pub use actions::Action;
pub use keys::{Query, normalize_query, serialize_query};
pub use reducer::{CacheState, reduce};
pub use store::{Dispatch, Store};
