//! The identity-provider boundary.
//!
//! The adapter consumes a provider only through `IdentityProvider`. Change
//! notifications are delivered to `AuthListener` callbacks; a
//! `Subscription` handle releases its listener when dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{AuthChangeEvent, Session, SignUpMetadata};

/// Callback invoked for every provider change notification.
pub type AuthListener = Arc<dyn Fn(AuthChangeEvent, Option<&Session>) + Send + Sync>;

/// An external authentication-as-a-service client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a change listener. The listener stays registered until the
    /// returned handle is dropped.
    fn subscribe(&self, listener: AuthListener) -> Subscription;

    /// Get the ambient session, if any.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<(), ProviderError>;

    /// Start a federated sign-in. Returns the authorization URL to navigate
    /// to when the provider does not navigate by itself.
    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<Option<String>, ProviderError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<(), ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError>;
}

// ─── Subscriptions ──────────────────────────────────────────────────

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Release the listener now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, AuthListener)>,
}

/// Listener bookkeeping shared by provider implementations.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: AuthListener) -> Subscription {
        let id = {
            let mut registry = lock(&self.inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener));
            id
        };
        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    /// Deliver a notification to every listener, in registration order.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<&Session>) {
        // Listeners run without the lock held so they may subscribe or
        // unsubscribe re-entrantly.
        let listeners: Vec<AuthListener> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event, session);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawUser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> AuthListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_: AuthChangeEvent, _: Option<&Session>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _a = registry.subscribe(counting_listener(&count));
        let _b = registry.subscribe(counting_listener(&count));

        let session = Session::new(RawUser::new("u1", Some("a@x.com")));
        registry.emit(AuthChangeEvent::SignedIn, Some(&session));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = registry.subscribe(counting_listener(&count));
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(registry.is_empty());
        registry.emit(AuthChangeEvent::SignedOut, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe_only_removes_own_listener() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let a = registry.subscribe(counting_listener(&count));
        let _b = registry.subscribe(counting_listener(&count));

        a.unsubscribe();
        registry.emit(AuthChangeEvent::SignedOut, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe(Arc::new(|_: AuthChangeEvent, _: Option<&Session>| {}));
        drop(registry);
        drop(sub);
    }
}
