//! The session adapter.
//!
//! Mirrors the identity provider's session into local state and mediates
//! the imperative auth operations. Operations only *request* actions from
//! the provider; identity and session are written solely by the provider's
//! change notifications (and the one startup probe), through the store's
//! reducer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::{AuthError, ProviderError};
use crate::notify::Notification;
use crate::options::AdapterOptions;
use crate::provider::{IdentityProvider, Subscription};
use crate::state::{Action, AuthState, AuthStore};
use crate::types::{AuthChangeEvent, Identity, Session, SignUpMetadata};

/// Process-wide auth state plus the five auth operations.
///
/// Cheap to clone; clones share state. The provider subscription is
/// released when the last clone is dropped or on `close()`.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use edu_auth::{AdapterOptions, MemoryIdentityProvider, SessionAdapter};
///
/// # async fn example() -> Result<(), edu_auth::AuthError> {
/// let provider = Arc::new(MemoryIdentityProvider::new());
/// let auth = SessionAdapter::start(provider, AdapterOptions::default()).await?;
///
/// auth.sign_in("admin@example.com", "secret").await?;
/// if auth.is_privileged() {
///     println!("show admin dashboard");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    store: AuthStore,
    options: AdapterOptions,
    /// Serializes imperative operations, first come first served.
    turn: tokio::sync::Mutex<()>,
    subscription: Mutex<Option<Subscription>>,
    probed: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    SignIn,
    FederatedSignIn,
    SignUp,
    SignOut,
    ResetPassword,
}

impl Operation {
    fn failure_title(&self) -> &'static str {
        match self {
            Operation::SignIn | Operation::FederatedSignIn => "Sign in failed",
            Operation::SignUp => "Sign up failed",
            Operation::SignOut => "Sign out failed",
            Operation::ResetPassword => "Password reset failed",
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            Operation::SignIn => "Unable to sign in. Please check your credentials and try again.",
            Operation::FederatedSignIn => "Unable to start sign in with the external provider.",
            Operation::SignUp => "Unable to create your account. Please try again.",
            Operation::SignOut => "Unable to sign out. Please try again.",
            Operation::ResetPassword => "Failed to send password reset email.",
        }
    }
}

/// Holds `loading` true for its lifetime, including when the operation's
/// future is dropped before completion.
struct LoadingGuard<'a> {
    store: &'a AuthStore,
}

impl<'a> LoadingGuard<'a> {
    fn begin(store: &'a AuthStore) -> Self {
        store.dispatch(Action::OperationStarted);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.dispatch(Action::OperationFinished);
    }
}

impl SessionAdapter {
    /// Subscribe to the provider, probe the current session, and return once
    /// the probe has resolved (`loading` is then false).
    pub async fn start(
        provider: Arc<dyn IdentityProvider>,
        options: AdapterOptions,
    ) -> Result<Self, AuthError> {
        let adapter = Self::new(provider, options)?;
        adapter.probe().await;
        Ok(adapter)
    }

    /// Subscribe to the provider without probing. The state stays `loading`
    /// until `probe()` resolves; notifications are applied from now on.
    pub fn new(provider: Arc<dyn IdentityProvider>, options: AdapterOptions) -> Result<Self, AuthError> {
        options.validate()?;
        let store = AuthStore::new(Arc::clone(&options.role_policy));

        let listener_store = store.clone();
        let subscription = provider.subscribe(Arc::new(
            move |event: AuthChangeEvent, session: Option<&Session>| {
                listener_store.dispatch(Action::SessionChanged {
                    event,
                    session: session.cloned(),
                });
            },
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                provider,
                store,
                options,
                turn: tokio::sync::Mutex::new(()),
                subscription: Mutex::new(Some(subscription)),
                probed: AtomicBool::new(false),
            }),
        })
    }

    /// Run the one startup session check. Later calls do nothing.
    pub async fn probe(&self) {
        if self.inner.probed.swap(true, Ordering::SeqCst) {
            return;
        }
        let probed = match self.inner.provider.get_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "initial session probe failed; starting signed out");
                None
            }
        };
        tracing::debug!(has_session = probed.is_some(), "initial session probe resolved");
        self.inner.store.dispatch(Action::InitialProbe(probed));
    }

    // ─── Read-only view ─────────────────────────────────────────────

    pub fn snapshot(&self) -> AuthState {
        self.inner.store.snapshot()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.store.read(|s| s.identity().cloned())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.store.read(|s| s.session().cloned())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.store.read(AuthState::is_loading)
    }

    /// Recomputed from the current identity on every call.
    pub fn is_privileged(&self) -> bool {
        self.inner.store.read(AuthState::is_privileged)
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.store.subscribe()
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.inner.options
    }

    /// Release the provider subscription now. Later notifications are ignored.
    pub fn close(&self) {
        let subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::debug!("auth subscription released");
        }
    }

    // ─── Operations ─────────────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// Success means the provider accepted the credentials; the identity
    /// shows up once the provider's `SIGNED_IN` notification arrives.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _turn = self.inner.turn.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.store);
        tracing::debug!(email, "password sign-in requested");

        self.inner
            .provider
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| self.fail(Operation::SignIn, err))
    }

    /// Start the federated sign-in flow.
    ///
    /// Returns the authorization URL to navigate to, when the provider
    /// produced one. The identity arrives later through notifications.
    pub async fn sign_in_with_oauth(&self) -> Result<Option<String>, AuthError> {
        let _turn = self.inner.turn.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.store);
        let options = &self.inner.options;
        tracing::debug!(provider = %options.oauth_provider, "federated sign-in requested");

        self.inner
            .provider
            .sign_in_with_oauth(&options.oauth_provider, &options.oauth_redirect_url())
            .await
            .map_err(|err| self.fail(Operation::FederatedSignIn, err))
    }

    /// Create an account with `display_name` attached as profile metadata.
    ///
    /// Success does not imply a session: the provider may require email
    /// confirmation first.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), AuthError> {
        let _turn = self.inner.turn.lock().await;
        let _loading = LoadingGuard::begin(&self.inner.store);
        tracing::debug!(email, "sign-up requested");

        let metadata = SignUpMetadata {
            display_name: display_name.to_string(),
        };
        self.inner
            .provider
            .sign_up(email, password, &metadata)
            .await
            .map_err(|err| self.fail(Operation::SignUp, err))?;

        self.notify(Notification::success(
            "Account created",
            "Your account has been created.",
        ));
        Ok(())
    }

    /// Sign out. Failures are reported to the notifier and not returned.
    pub async fn sign_out(&self) {
        let _turn = self.inner.turn.lock().await;
        tracing::debug!("sign-out requested");

        if let Err(err) = self.inner.provider.sign_out().await {
            let _ = self.fail(Operation::SignOut, err);
        }
    }

    /// Ask the provider to email a password-reset link.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let _turn = self.inner.turn.lock().await;
        tracing::debug!(email, "password reset requested");

        let redirect_to = self.inner.options.password_reset_redirect_url();
        self.inner
            .provider
            .reset_password_for_email(email, &redirect_to)
            .await
            .map_err(|err| self.fail(Operation::ResetPassword, err))?;

        self.notify(Notification::success(
            "Password reset email sent",
            "Check your inbox for further instructions.",
        ));
        Ok(())
    }

    // ─── Internal helpers ───────────────────────────────────────────

    fn notify(&self, notification: Notification) {
        self.inner.options.notifier.notify(notification);
    }

    fn fail(&self, operation: Operation, err: ProviderError) -> AuthError {
        tracing::warn!(?operation, error = %err, "auth operation failed");
        let description = err
            .user_message()
            .unwrap_or(operation.fallback_message())
            .to_string();
        self.notify(Notification::error(operation.failure_title(), description));
        AuthError::Provider(err)
    }
}

impl std::fmt::Debug for SessionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAdapter")
            .field("state", &self.inner.store)
            .field("options", &self.inner.options)
            .finish()
    }
}
