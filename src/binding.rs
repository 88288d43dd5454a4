//! Binding between declared data requirements and the resource cache.
//!
//! A [`QueryBinding`] is told which slug or query its owner needs, first on
//! activation and then on every input change. When the selection changed and
//! nothing matching is already in flight it asks its [`QuerySource`] to fetch.
//! It produces no output of its own.

use tracing::debug;

use crate::cache::Query;
use crate::resource::Resource;

/// Accessor/orchestrator pair for one resource kind.
///
/// The `request_*` methods return whether a fetch was actually started.
pub trait QuerySource {
    fn is_requesting_single(&self, slug: &str) -> bool;
    fn is_requesting_for_query(&self, query: Option<&Query>) -> bool;
    fn request_single(&self, slug: &str) -> bool;
    fn request_collection(&self, query: Option<&Query>) -> bool;
}

impl QuerySource for Resource {
    fn is_requesting_single(&self, slug: &str) -> bool {
        self.store().is_requesting_single(slug)
    }

    fn is_requesting_for_query(&self, query: Option<&Query>) -> bool {
        self.store().is_requesting_for_query(query)
    }

    // Detached: completion is observed through the store.
    fn request_single(&self, slug: &str) -> bool {
        self.requester()
            .request_single(slug.to_owned())
            .is_some()
    }

    fn request_collection(&self, query: Option<&Query>) -> bool {
        self.requester()
            .request_collection(query.cloned().unwrap_or_default())
            .is_some()
    }
}

/// Inputs of a binding. A non-empty `slug` selects single-record mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingProps {
    pub slug: Option<String>,
    pub query: Option<Query>,
}

impl BindingProps {
    pub fn single(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            query: None,
        }
    }

    pub fn collection(query: Query) -> Self {
        Self {
            slug: None,
            query: Some(query),
        }
    }

    fn single_slug(&self) -> Option<&str> {
        self.slug.as_deref().filter(|slug| !slug.is_empty())
    }
}

/// Keeps one set of [`BindingProps`] in sync with a [`QuerySource`].
pub struct QueryBinding<S> {
    source: S,
    current: Option<BindingProps>,
}

impl<S: QuerySource> QueryBinding<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn props(&self) -> Option<&BindingProps> {
        self.current.as_ref()
    }

    /// First activation: always evaluates `props`. Returns whether a fetch
    /// was triggered.
    pub fn activate(&mut self, props: BindingProps) -> bool {
        let triggered = self.request(&props);
        self.current = Some(props);
        triggered
    }

    /// Input change: evaluates `props` only if the slug or query differs from
    /// the previous inputs. Returns whether a fetch was triggered.
    pub fn update(&mut self, props: BindingProps) -> bool {
        let unchanged = self
            .current
            .as_ref()
            .is_some_and(|current| current.slug == props.slug && current.query == props.query);
        if unchanged {
            return false;
        }
        self.activate(props)
    }

    fn request(&self, props: &BindingProps) -> bool {
        match props.single_slug() {
            Some(slug) if !self.source.is_requesting_single(slug) => {
                debug!(slug, "Request single record");
                self.source.request_single(slug)
            }
            Some(_) => false,
            None if !self.source.is_requesting_for_query(props.query.as_ref()) => {
                debug!(query = ?props.query, "Request record list");
                self.source.request_collection(props.query.as_ref())
            }
            None => false,
        }
    }
}
