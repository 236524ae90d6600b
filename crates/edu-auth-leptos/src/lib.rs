//! # edu-auth-leptos
//!
//! Leptos integration for the EduEngineer session adapter. Injects one
//! `SessionAdapter` into the component tree as context and mirrors its state
//! into reactive signals.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use edu_auth::{AdapterOptions, HttpIdentityProvider, HttpProviderOptions, SessionAdapter};
//! use edu_auth_leptos::*;
//! use leptos::prelude::*;
//!
//! #[component]
//! fn App() -> impl IntoView {
//!     let provider = Arc::new(HttpIdentityProvider::new(HttpProviderOptions::from_env()));
//!     let adapter = SessionAdapter::new(provider, AdapterOptions::from_env())
//!         .expect("valid auth options");
//!     provide_auth(adapter);
//!
//!     view! { <Dashboard /> }
//! }
//!
//! #[component]
//! fn Dashboard() -> impl IntoView {
//!     let identity = use_identity();
//!     let is_admin = use_is_privileged();
//!     view! {
//!         <Show when=move || identity.get().is_some()>
//!             <p>"Welcome back!"</p>
//!             <Show when=move || is_admin.get()>
//!                 <a href="/dashboard/admin">"Admin"</a>
//!             </Show>
//!         </Show>
//!     }
//! }
//! ```

use edu_auth::guard::{admin_access, auth_page_access, dashboard_access};
use edu_auth::{Access, AdapterOptions, AuthError, AuthState, Identity, SessionAdapter};
use leptos::prelude::*;
use leptos::task::spawn_local;

/// Auth context stored in Leptos's reactive context system.
#[derive(Clone)]
pub struct AuthContext {
    /// The injected session adapter.
    pub adapter: SessionAdapter,
    /// Reactive mirror of the adapter state.
    pub state: RwSignal<AuthState>,
}

/// Provide the adapter to the Leptos context tree.
///
/// Starts the session probe and keeps `state` in step with the adapter.
/// Must be called in a parent component before any `use_*` hook.
pub fn provide_auth(adapter: SessionAdapter) -> AuthContext {
    let state = RwSignal::new(adapter.snapshot());

    let mut changes = adapter.watch();
    spawn_local(async move {
        while changes.changed().await.is_ok() {
            let snapshot = changes.borrow_and_update().clone();
            state.set(snapshot);
        }
        tracing::debug!("auth state channel closed");
    });

    let probe = adapter.clone();
    spawn_local(async move {
        probe.probe().await;
    });

    let ctx = AuthContext { adapter, state };
    provide_context(ctx.clone());
    ctx
}

/// Get the auth context.
///
/// Panics if `provide_auth()` was not called in a parent component.
pub fn use_auth() -> AuthContext {
    expect_context::<AuthContext>()
}

/// Full reactive state (identity, session, loading).
pub fn use_auth_state() -> ReadSignal<AuthState> {
    use_auth().state.read_only()
}

/// The current enhanced identity, if signed in.
pub fn use_identity() -> Signal<Option<Identity>> {
    let state = use_auth().state;
    Signal::derive(move || state.with(|s| s.identity().cloned()))
}

/// Whether the first session check or an auth operation is in flight.
pub fn use_auth_loading() -> Signal<bool> {
    let state = use_auth().state;
    Signal::derive(move || state.with(AuthState::is_loading))
}

/// Whether the current identity is an admin.
pub fn use_is_privileged() -> Signal<bool> {
    let state = use_auth().state;
    Signal::derive(move || state.with(AuthState::is_privileged))
}

/// Which route guard `use_access` evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    AuthPage,
    Dashboard,
    Admin,
}

/// Reactive route-access decision for a layout.
pub fn use_access(kind: GuardKind) -> Signal<Access> {
    let ctx = use_auth();
    let state = ctx.state;
    let options: AdapterOptions = ctx.adapter.options().clone();
    Signal::derive(move || {
        state.with(|s| match kind {
            GuardKind::AuthPage => auth_page_access(s, &options),
            GuardKind::Dashboard => dashboard_access(s, &options),
            GuardKind::Admin => admin_access(s, &options),
        })
    })
}

// ─── Operations ─────────────────────────────────────────────────────

/// Action dispatching `(email, password)` to `SessionAdapter::sign_in`.
pub fn use_sign_in() -> Action<(String, String), Result<(), AuthError>> {
    let adapter = use_auth().adapter;
    Action::new(move |(email, password): &(String, String)| {
        let adapter = adapter.clone();
        let email = email.clone();
        let password = password.clone();
        async move { adapter.sign_in(&email, &password).await }
    })
}

/// Action starting federated sign-in. Resolves to the URL to navigate to.
pub fn use_sign_in_with_oauth() -> Action<(), Result<Option<String>, AuthError>> {
    let adapter = use_auth().adapter;
    Action::new(move |_: &()| {
        let adapter = adapter.clone();
        async move { adapter.sign_in_with_oauth().await }
    })
}

/// Action dispatching `(email, password, display_name)` to `sign_up`.
pub fn use_sign_up() -> Action<(String, String, String), Result<(), AuthError>> {
    let adapter = use_auth().adapter;
    Action::new(move |(email, password, display_name): &(String, String, String)| {
        let adapter = adapter.clone();
        let email = email.clone();
        let password = password.clone();
        let display_name = display_name.clone();
        async move { adapter.sign_up(&email, &password, &display_name).await }
    })
}

/// Action requesting a password-reset email.
pub fn use_reset_password() -> Action<String, Result<(), AuthError>> {
    let adapter = use_auth().adapter;
    Action::new(move |email: &String| {
        let adapter = adapter.clone();
        let email = email.clone();
        async move { adapter.reset_password(&email).await }
    })
}

/// Sign out. The state clears when the provider's notification arrives.
pub fn sign_out() {
    let adapter = use_auth().adapter;
    spawn_local(async move {
        adapter.sign_out().await;
    });
}
