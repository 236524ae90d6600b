//! Adapter state and its reducer.
//!
//! Every write to the state goes through `AuthStore::dispatch`, which applies
//! `AuthState::reduce` inside a `tokio::sync::watch` channel. Identity and
//! session live in one `Option` so one can never exist without the other.

use std::sync::Arc;

use tokio::sync::watch;

use crate::enhance::{enhance_user_with, RolePolicy};
use crate::types::{AuthChangeEvent, Identity, Session};

/// An enhanced identity together with the session it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub identity: Identity,
    pub session: Session,
}

/// Snapshot of the adapter state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    authenticated: Option<Authenticated>,
    in_flight: u32,
    initialized: bool,
    notifications_applied: u64,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            authenticated: None,
            in_flight: 0,
            initialized: false,
            notifications_applied: 0,
        }
    }
}

/// Inputs to the reducer.
#[derive(Debug, Clone)]
pub enum Action {
    /// A provider change notification.
    SessionChanged {
        event: AuthChangeEvent,
        session: Option<Session>,
    },
    /// Result of the startup session probe.
    InitialProbe(Option<Session>),
    /// An imperative operation started talking to the provider.
    OperationStarted,
    /// That operation finished (either way).
    OperationFinished,
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        self.authenticated.as_ref().map(|a| &a.identity)
    }

    pub fn session(&self) -> Option<&Session> {
        self.authenticated.as_ref().map(|a| &a.session)
    }

    pub fn authenticated(&self) -> Option<&Authenticated> {
        self.authenticated.as_ref()
    }

    /// `true` until the startup probe resolves and while any operation is
    /// in flight.
    pub fn is_loading(&self) -> bool {
        !self.initialized || self.in_flight > 0
    }

    /// Whether the startup probe has resolved.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// `true` iff an identity is present and its role is admin.
    pub fn is_privileged(&self) -> bool {
        self.identity().is_some_and(|identity| identity.role.is_admin())
    }

    /// Settled and without an identity.
    pub fn is_unauthenticated(&self) -> bool {
        !self.is_loading() && self.authenticated.is_none()
    }

    pub fn reduce(&mut self, action: Action, policy: &dyn RolePolicy) {
        match action {
            Action::SessionChanged { event, session } => {
                tracing::debug!(event = %event, has_session = session.is_some(), "auth state change");
                self.notifications_applied += 1;
                self.authenticated = session.map(|s| authenticate(s, policy));
            }
            Action::InitialProbe(session) => {
                // A notification that arrived while the probe was in flight
                // is newer than the probe result.
                if self.notifications_applied == 0 {
                    self.authenticated = session.map(|s| authenticate(s, policy));
                }
                self.initialized = true;
            }
            Action::OperationStarted => self.in_flight += 1,
            Action::OperationFinished => self.in_flight = self.in_flight.saturating_sub(1),
        }
    }
}

fn authenticate(session: Session, policy: &dyn RolePolicy) -> Authenticated {
    Authenticated {
        identity: enhance_user_with(&session.user, policy),
        session,
    }
}

/// Owner of the state channel. The only place state is written.
#[derive(Clone)]
pub(crate) struct AuthStore {
    sender: Arc<watch::Sender<AuthState>>,
    policy: Arc<dyn RolePolicy>,
}

impl AuthStore {
    pub(crate) fn new(policy: Arc<dyn RolePolicy>) -> Self {
        let (sender, _) = watch::channel(AuthState::default());
        Self {
            sender: Arc::new(sender),
            policy,
        }
    }

    pub(crate) fn dispatch(&self, action: Action) {
        let policy = Arc::clone(&self.policy);
        self.sender
            .send_modify(|state| state.reduce(action, policy.as_ref()));
    }

    pub(crate) fn snapshot(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    /// Read a value out of the current state without cloning it.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&AuthState) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("state", &*self.sender.borrow())
            .finish()
    }
}
