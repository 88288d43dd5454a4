//! Resource store: the current cache snapshot plus dispatch.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::record::{Record, RecordId};
use crate::resource::ResourceKind;

use super::actions::Action;
use super::keys::Query;
use super::reducer::{self, CacheState};
use super::selectors;

const ACTION_CHANNEL_CAPACITY: usize = 64;

/// Sink for cache actions.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, action: Action);
}

/// Holds the cache of one resource kind.
///
/// Dispatch runs the reducers under the write lock and swaps in the new
/// snapshot; readers only ever see whole snapshots. Every dispatched action
/// is also published to subscribers.
pub struct Store {
    kind: Arc<ResourceKind>,
    state: RwLock<CacheState>,
    actions: broadcast::Sender<Action>,
}

impl Store {
    pub fn new(kind: Arc<ResourceKind>) -> Self {
        let (actions, _) = broadcast::channel(ACTION_CHANNEL_CAPACITY);
        Self {
            kind,
            state: RwLock::new(CacheState::default()),
            actions,
        }
    }

    pub fn kind(&self) -> &Arc<ResourceKind> {
        &self.kind
    }

    /// Current snapshot.
    pub fn state(&self) -> CacheState {
        self.read("state").clone()
    }

    /// Receive every action dispatched after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.actions.subscribe()
    }

    pub fn get_by_id(&self, id: RecordId) -> Option<Arc<Record>> {
        selectors::get_by_id(&self.read("get_by_id"), id)
    }

    pub fn get_for_query(&self, query: Option<&Query>) -> Option<Vec<Arc<Record>>> {
        let state = self.read("get_for_query");
        selectors::get_for_query(&state, &self.kind, query)
    }

    pub fn is_requesting_single(&self, slug: &str) -> bool {
        let state = self.read("is_requesting_single");
        selectors::is_requesting_single(&state, slug)
    }

    pub fn is_requesting_for_query(&self, query: Option<&Query>) -> bool {
        let state = self.read("is_requesting_for_query");
        selectors::is_requesting_for_query(&state, &self.kind, query)
    }

    pub fn total_pages_for_query(&self, query: Option<&Query>) -> u64 {
        let state = self.read("total_pages_for_query");
        selectors::total_pages_for_query(&state, &self.kind, query)
    }

    pub fn id_from_slug(&self, slug: &str) -> Option<RecordId> {
        selectors::id_from_slug(&self.read("id_from_slug"), slug)
    }

    // A panic while holding the lock can only happen between whole snapshot
    // swaps, so the inner state is still a valid snapshot.
    fn read(&self, op: &'static str) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!(resource = self.kind.name(), op, "Store lock poisoned; reading last snapshot");
            poisoned.into_inner()
        })
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!(resource = self.kind.name(), op, "Store lock poisoned; replacing last snapshot");
            poisoned.into_inner()
        })
    }
}

impl Dispatch for Store {
    fn dispatch(&self, action: Action) {
        trace!(resource = self.kind.name(), action = action.tag(), "Dispatching cache action");

        let mut state = self.write("dispatch");
        *state = reducer::reduce(&state, &action, &self.kind);
        // Published under the lock so subscribers observe actions in reduce order.
        let _ = self.actions.send(action);
    }
}
