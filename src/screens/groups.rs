//! "My groups" screen model
//!
//! Reloads the listing every time the screen gains focus. A reload result
//! is applied only if no newer reload started in the meantime and the
//! screen is still active, so a late response never overwrites fresher
//! state or writes into a screen the user already left.

use crate::models::GroupListItem;
use crate::services::group_listing::GroupListingProjector;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What the screen renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsState {
    pub loading: bool,
    pub items: Vec<GroupListItem>,
    pub error: Option<String>,
}

impl GroupsState {
    /// Loaded successfully and has nothing to show
    pub fn is_empty(&self) -> bool {
        !self.loading && self.error.is_none() && self.items.is_empty()
    }
}

struct Inner {
    projector: GroupListingProjector,
    state: watch::Sender<GroupsState>,
    generation: AtomicU64,
    active: AtomicBool,
}

/// Groups screen; clones drive the same screen
#[derive(Clone)]
pub struct GroupsScreen {
    inner: Arc<Inner>,
}

impl GroupsScreen {
    pub fn new(projector: GroupListingProjector) -> Self {
        let (state, _) = watch::channel(GroupsState::default());
        Self {
            inner: Arc::new(Inner {
                projector,
                state,
                generation: AtomicU64::new(0),
                active: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> GroupsState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GroupsState> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Mark the screen active and reload.
    ///
    /// Returns whether this reload's result was applied.
    pub async fn focus(&self) -> bool {
        self.inner.active.store(true, Ordering::SeqCst);
        self.refresh().await
    }

    /// [`focus`](Self::focus) on a background task
    pub fn focus_in_background(&self) -> JoinHandle<bool> {
        let screen = self.clone();
        tokio::spawn(async move { screen.focus().await })
    }

    /// Mark the screen inactive; in-flight reloads finish but are discarded
    pub fn blur(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }

    /// Reload the listing under a new generation.
    ///
    /// Does nothing on an inactive screen.
    pub async fn refresh(&self) -> bool {
        if !self.is_active() {
            tracing::debug!("Ignoring refresh of inactive groups screen");
            return false;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self.inner.projector.list_my_groups().await;

        if !self.is_current(generation) {
            tracing::debug!(generation, "Discarding stale group listing");
            return false;
        }

        self.inner.state.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(items) => state.items = items,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load groups");
                    state.error = Some(e.user_message());
                }
            }
        });
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_active() && self.inner.generation.load(Ordering::SeqCst) == generation
    }
}
