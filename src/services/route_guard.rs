//! Route guard
//!
//! Decides whether the current route may be shown for the current session.
//! [`decide`] is a pure function of its inputs; [`GuardDriver`] re-runs it
//! whenever either the session or the route segment changes, in whatever
//! order those changes arrive.

use crate::config::RoutesConfig;
use crate::models::AuthSession;
use crate::services::session_store::{SessionSnapshot, SessionSubscription};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Navigation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Leave navigation alone (also used while the session is restoring)
    Stay,
    /// Replace the current route with this path
    RedirectTo(String),
}

/// The current route, split into path segments.
///
/// `"/(auth)/login"` becomes `["(auth)", "login"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RouteSegment {
    segments: Vec<String>,
}

impl RouteSegment {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// First segment, `None` at the root
    pub fn root(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Whether this route lives under the given top-level group
    pub fn is_within(&self, group: &str) -> bool {
        self.root() == Some(group)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Decide the navigation action for one set of inputs.
pub fn decide(
    routes: &RoutesConfig,
    session: Option<&AuthSession>,
    segment: &RouteSegment,
    initialized: bool,
) -> NavAction {
    if !initialized {
        return NavAction::Stay;
    }

    let in_auth_area = segment.is_within(&routes.auth_group);
    match (session.is_some(), in_auth_area) {
        (false, false) => NavAction::RedirectTo(routes.auth_entry.clone()),
        (true, true) => NavAction::RedirectTo(routes.app_entry.clone()),
        _ => NavAction::Stay,
    }
}

/// [`decide`] bound to a routes configuration.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RoutesConfig,
}

impl RouteGuard {
    pub fn new(routes: RoutesConfig) -> Self {
        Self { routes }
    }

    pub fn decide(
        &self,
        session: Option<&AuthSession>,
        segment: &RouteSegment,
        initialized: bool,
    ) -> NavAction {
        decide(&self.routes, session, segment, initialized)
    }

    pub fn decide_snapshot(&self, snapshot: &SessionSnapshot, segment: &RouteSegment) -> NavAction {
        self.decide(snapshot.session.as_ref(), segment, snapshot.initialized)
    }
}

/// The navigation subsystem, as seen by the guard.
pub trait Navigator: Send + Sync + 'static {
    fn redirect_to(&self, path: &str);
}

enum GuardEvent {
    Session(Option<SessionSnapshot>),
    Segment(bool),
}

/// Re-evaluates the guard on every session or segment change.
///
/// A redirect is issued once per distinct input set: re-running with the
/// same signed-in state and segment does not navigate again.
pub struct GuardDriver<N: Navigator> {
    guard: RouteGuard,
    sessions: SessionSubscription,
    segments: watch::Receiver<RouteSegment>,
    navigator: N,
    last_redirect: Option<(bool, RouteSegment, String)>,
}

impl<N: Navigator> GuardDriver<N> {
    pub fn new(
        guard: RouteGuard,
        sessions: SessionSubscription,
        segments: watch::Receiver<RouteSegment>,
        navigator: N,
    ) -> Self {
        Self {
            guard,
            sessions,
            segments,
            navigator,
            last_redirect: None,
        }
    }

    /// Run until either source is dropped
    pub async fn run(mut self) {
        let mut snapshot = self.sessions.current();
        let mut segment = self.segments.borrow_and_update().clone();
        self.evaluate(&snapshot, &segment);

        loop {
            let event = tokio::select! {
                next = self.sessions.changed() => GuardEvent::Session(next),
                changed = self.segments.changed() => GuardEvent::Segment(changed.is_ok()),
            };

            match event {
                GuardEvent::Session(Some(next)) => snapshot = next,
                GuardEvent::Segment(true) => segment = self.segments.borrow_and_update().clone(),
                GuardEvent::Session(None) | GuardEvent::Segment(false) => break,
            }

            self.evaluate(&snapshot, &segment);
        }

        tracing::debug!("Route guard stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn evaluate(&mut self, snapshot: &SessionSnapshot, segment: &RouteSegment) {
        let action = self.guard.decide_snapshot(snapshot, segment);
        tracing::debug!(?action, ?segment, initialized = snapshot.initialized, "Route guard evaluated");

        match action {
            NavAction::Stay => self.last_redirect = None,
            NavAction::RedirectTo(target) => {
                let key = (snapshot.is_signed_in(), segment.clone(), target);
                if self.last_redirect.as_ref() == Some(&key) {
                    return;
                }
                self.navigator.redirect_to(&key.2);
                self.last_redirect = Some(key);
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::services::session_store::test_support::session_for;
    use proptest::prelude::*;

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("(auth)".to_string()),
                Just("(tabs)".to_string()),
                "[a-z]{1,8}",
            ],
            0..4,
        )
        .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Same inputs, same action, every time.
        #[test]
        fn decide_is_deterministic(
            path in path_strategy(),
            signed_in in any::<bool>(),
            initialized in any::<bool>(),
        ) {
            let routes = RoutesConfig::default();
            let session = signed_in.then(|| session_for(1, "p"));
            let segment = RouteSegment::parse(&path);

            let first = decide(&routes, session.as_ref(), &segment, initialized);
            let second = decide(&routes, session.as_ref(), &segment, initialized);
            prop_assert_eq!(first, second);
        }

        /// Following a redirect lands on a route where the guard stays.
        #[test]
        fn redirect_target_is_stable(
            path in path_strategy(),
            signed_in in any::<bool>(),
        ) {
            let routes = RoutesConfig::default();
            let session = signed_in.then(|| session_for(1, "p"));
            let segment = RouteSegment::parse(&path);

            if let NavAction::RedirectTo(target) = decide(&routes, session.as_ref(), &segment, true) {
                let landed = RouteSegment::parse(&target);
                prop_assert_eq!(decide(&routes, session.as_ref(), &landed, true), NavAction::Stay);
            }
        }
    }
}
