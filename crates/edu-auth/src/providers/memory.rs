// In-memory identity provider: a HashMap-backed stand-in for a hosted
// auth service, used by tests and local demos.
//
// Accounts are keyed by email. Notifications are emitted synchronously from
// the call that caused them, after internal locks are released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::error::ProviderError;
use crate::provider::{AuthListener, IdentityProvider, ListenerRegistry, Subscription};
use crate::types::{AuthChangeEvent, RawUser, Session, SignUpMetadata};

/// The provider calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCall {
    GetSession,
    SignInWithPassword,
    SignInWithOAuth,
    SignUp,
    SignOut,
    ResetPassword,
}

/// A password-reset email the provider "sent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentResetEmail {
    pub email: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: RawUser,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    failures: HashMap<ProviderCall, ProviderError>,
    reset_emails: Vec<SentResetEmail>,
    calls: Vec<ProviderCall>,
}

/// In-memory identity provider.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityProvider {
    store: Arc<Mutex<Store>>,
    listeners: ListenerRegistry,
    auto_confirm: bool,
    sign_in_gate: Arc<tokio::sync::Mutex<()>>,
    session_gate: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryIdentityProvider {
    /// New provider whose sign-ups require email confirmation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups are confirmed immediately and start a session.
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Register a confirmed account.
    pub fn add_user(&self, email: &str, password: &str) -> RawUser {
        self.add_raw_user(RawUser::new(nanoid::nanoid!(), Some(email)), password)
    }

    /// Register a confirmed account with a prepared user record.
    pub fn add_raw_user(&self, user: RawUser, password: &str) -> RawUser {
        let email = user.email.clone().unwrap_or_default();
        self.store().accounts.insert(
            email,
            Account {
                password: password.to_string(),
                user: user.clone(),
                confirmed: true,
            },
        );
        user
    }

    /// Mark an account's email as confirmed.
    pub fn confirm_email(&self, email: &str) -> bool {
        match self.store().accounts.get_mut(email) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Replace the ambient session without notifying listeners.
    pub fn set_session(&self, session: Option<Session>) {
        self.store().session = session;
    }

    /// Replace the ambient session and notify listeners.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.store().session = session.clone();
        self.listeners.emit(event, session.as_ref());
    }

    /// Make the next call of `call` fail with `error`.
    pub fn fail_next(&self, call: ProviderCall, error: ProviderError) {
        self.store().failures.insert(call, error);
    }

    /// Hold password sign-ins until the returned guard is dropped.
    pub async fn hold_sign_in(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.sign_in_gate).lock_owned().await
    }

    /// Hold session lookups until the returned guard is dropped.
    pub async fn hold_get_session(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.session_gate).lock_owned().await
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn reset_emails(&self) -> Vec<SentResetEmail> {
        self.store().reset_emails.clone()
    }

    /// Every provider call made so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.store().calls.clone()
    }

    pub fn account_metadata(&self, email: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.store()
            .accounts
            .get(email)
            .map(|a| a.user.user_metadata.clone())
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and take any injected failure for it.
    fn begin(&self, call: ProviderCall) -> Result<(), ProviderError> {
        let mut store = self.store();
        store.calls.push(call);
        match store.failures.remove(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn open_session(&self, user: RawUser) -> Session {
        let session = Session::new(user).with_access_token(nanoid::nanoid!(32));
        self.store().session = Some(session.clone());
        session
    }
}

fn invalid_credentials() -> ProviderError {
    ProviderError::Rejected {
        status: Some(400),
        code: Some("invalid_credentials".into()),
        message: "Invalid login credentials".into(),
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let _gate = self.session_gate.lock().await;
        self.begin(ProviderCall::GetSession)?;
        Ok(self.store().session.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let _gate = self.sign_in_gate.lock().await;
        self.begin(ProviderCall::SignInWithPassword)?;

        let account = self.store().accounts.get(email).cloned();
        let account = match account {
            Some(account) if account.password == password => account,
            _ => return Err(invalid_credentials()),
        };
        if !account.confirmed {
            return Err(ProviderError::Rejected {
                status: Some(400),
                code: Some("email_not_confirmed".into()),
                message: "Email not confirmed".into(),
            });
        }

        let session = self.open_session(account.user);
        self.listeners.emit(AuthChangeEvent::SignedIn, Some(&session));
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.begin(ProviderCall::SignInWithOAuth)?;
        Ok(Some(format!(
            "memory://oauth/{provider}?redirect_to={redirect_to}"
        )))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<(), ProviderError> {
        self.begin(ProviderCall::SignUp)?;

        let user = RawUser::new(nanoid::nanoid!(), Some(email))
            .with_metadata("display_name", metadata.display_name.as_str());
        {
            let mut store = self.store();
            if store.accounts.contains_key(email) {
                return Err(ProviderError::Rejected {
                    status: Some(422),
                    code: Some("user_already_exists".into()),
                    message: "User already registered".into(),
                });
            }
            store.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                    confirmed: self.auto_confirm,
                },
            );
        }

        if self.auto_confirm {
            let session = self.open_session(user);
            self.listeners.emit(AuthChangeEvent::SignedIn, Some(&session));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.begin(ProviderCall::SignOut)?;
        self.store().session = None;
        self.listeners.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        self.begin(ProviderCall::ResetPassword)?;
        // Unknown addresses succeed too, so callers cannot probe for accounts.
        self.store().reset_emails.push(SentResetEmail {
            email: email.to_string(),
            redirect_to: redirect_to.to_string(),
        });
        Ok(())
    }
}
