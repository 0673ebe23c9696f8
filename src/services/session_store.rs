//! Session store
//!
//! Holds the current authentication session as an observable value. There is
//! one writer, the auth service, and any number of readers (route guard,
//! membership service, screen models).
//!
//! Readers see a stream of current-value snapshots, not deltas: a slow reader
//! may skip intermediate transitions but always observes the latest one.

use crate::models::AuthSession;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// False until restoration at app start has finished
    pub initialized: bool,
    pub session: Option<AuthSession>,
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Shared handle to the current session. Clones observe the same value.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.tx.borrow();
        f.debug_struct("SessionStore")
            .field("initialized", &snapshot.initialized)
            .field("user_id", &snapshot.session.as_ref().map(AuthSession::user_id))
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// A store that is still restoring (not initialized, no session)
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot without waiting for restoration
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.tx.borrow().initialized
    }

    /// Current session, suspending until restoration has finished
    pub async fn current_session(&self) -> Option<AuthSession> {
        let mut rx = self.tx.subscribe();
        let session = match rx.wait_for(|snapshot| snapshot.initialized).await {
            Ok(snapshot) => snapshot.session.clone(),
            // Unreachable while `self` holds the sender
            Err(_) => None,
        };
        session
    }

    /// Current session if one is present right now
    pub fn try_current_session(&self) -> Option<AuthSession> {
        self.tx.borrow().session.clone()
    }

    /// Receive every subsequent transition. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Invoke `listener` on a background task for every subsequent transition.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen<F>(&self, mut listener: F) -> ListenerHandle
    where
        F: FnMut(&SessionSnapshot) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                listener(&snapshot);
            }
        });
        ListenerHandle { task: Some(task) }
    }

    /// Replace the session and mark the store initialized.
    ///
    /// Only the auth service writes; everything else reads.
    pub(crate) fn publish(&self, session: Option<AuthSession>) {
        tracing::debug!(
            signed_in = session.is_some(),
            user_id = session.as_ref().map(AuthSession::user_id),
            "Publishing session transition"
        );
        self.tx.send_replace(SessionSnapshot {
            initialized: true,
            session,
        });
    }
}

/// Pull-style subscription to session transitions.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<SessionSnapshot>,
}

impl SessionSubscription {
    /// Latest snapshot, marking it seen
    pub fn current(&mut self) -> SessionSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next transition; `None` once the store is gone
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Handle for a [`SessionStore::listen`] callback. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::Identity;
    use chrono::{Duration, Utc};

    pub fn session_for(user_id: i64, username: &str) -> AuthSession {
        AuthSession {
            token: format!("token-{}", user_id),
            user: Identity {
                id: user_id,
                email: format!("{}@example.com", username),
                username: username.to_string(),
                display_name: username.to_string(),
            },
            expires_at: Utc::now() + Duration::days(1),
        }
    }

    pub fn signed_in_store(user_id: i64, username: &str) -> SessionStore {
        let store = SessionStore::new();
        store.publish(Some(session_for(user_id, username)));
        store
    }
}
