//! Session adapter integration tests.
//!
//! Covers: startup, sign-in/out through provider notifications, failure
//! notifications, sign-up, federated sign-in, password reset, privilege
//! derivation, operation ordering, and route guards.

use std::sync::Arc;

use edu_auth::guard::{admin_access, dashboard_access};
use edu_auth::providers::memory::ProviderCall;
use edu_auth::*;

async fn start_with(
    provider: &Arc<MemoryIdentityProvider>,
) -> (SessionAdapter, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let options = AdapterOptions::default().with_notifier(Arc::new(notifier.clone()));
    let auth = SessionAdapter::start(provider.clone(), options)
        .await
        .expect("adapter starts");
    (auth, notifier)
}

fn session_for(email: &str) -> Session {
    Session::new(RawUser::new(format!("id-{email}"), Some(email))).with_access_token("tok")
}

fn assert_paired(auth: &SessionAdapter) {
    let state = auth.snapshot();
    assert_eq!(state.identity().is_some(), state.session().is_some());
}

// ── Startup ─────────────────────────────────────────────────────

#[tokio::test]
async fn start_without_prior_session() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let notifier = RecordingNotifier::new();
    let options = AdapterOptions::default().with_notifier(Arc::new(notifier.clone()));

    let auth = SessionAdapter::start(provider.clone(), options).await.unwrap();
    let state = auth.snapshot();
    assert!(state.is_initialized());
    assert!(!state.is_loading());
    assert!(state.is_unauthenticated());
    assert!(!auth.is_privileged());
    assert_paired(&auth);
    assert_eq!(provider.calls(), vec![ProviderCall::GetSession]);
}

#[tokio::test]
async fn watch_observes_loading_transition() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, _) = start_with(&provider).await;
    let mut rx = auth.watch();
    assert!(!rx.borrow_and_update().is_loading());

    provider.add_user("bob@x.com", "pw");
    auth.sign_in("bob@x.com", "pw").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().identity().is_some());
}

// ── Password sign-in ────────────────────────────────────────────

#[tokio::test]
async fn admin_sign_in_becomes_privileged() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("admin@x.com", "secret");
    let (auth, notifier) = start_with(&provider).await;

    auth.sign_in("admin@x.com", "secret").await.unwrap();

    let identity = auth.current_identity().expect("identity from SIGNED_IN");
    assert_eq!(identity.role, Role::Admin);
    assert_eq!(identity.display_name, "admin");
    assert!(auth.is_privileged());
    assert!(!auth.is_loading());
    assert!(notifier.errors().is_empty());
    assert_paired(&auth);
}

#[tokio::test]
async fn sign_in_does_not_write_identity_itself() {
    // A provider that accepts credentials but never notifies.
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, _) = start_with(&provider).await;
    provider.add_user("bob@x.com", "pw");
    auth.close();

    auth.sign_in("bob@x.com", "pw").await.unwrap();
    assert!(auth.current_identity().is_none());
    assert!(auth.current_session().is_none());
}

#[tokio::test]
async fn notification_for_admin_after_sign_in() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("someone@x.com", "pw");
    let (auth, _) = start_with(&provider).await;

    auth.sign_in("someone@x.com", "pw").await.unwrap();
    assert!(!auth.is_privileged());

    provider.emit(AuthChangeEvent::UserUpdated, Some(session_for("admin@x.com")));
    assert_eq!(auth.current_identity().unwrap().role, Role::Admin);
    assert!(auth.is_privileged());
}

#[tokio::test]
async fn rejected_sign_in_keeps_identity() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.set_session(Some(session_for("bob@x.com")));
    let (auth, notifier) = start_with(&provider).await;
    let before = auth.current_identity();

    let err = auth.sign_in("bob@x.com", "wrong").await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid login credentials");
    let last = notifier.last().expect("failure notification");
    assert_eq!(last.kind, NotificationKind::Error);
    assert_eq!(last.title, "Sign in failed");
    assert_eq!(last.description, "Invalid login credentials");
    assert!(!auth.is_loading());
    assert_eq!(auth.current_identity(), before);
}

#[tokio::test]
async fn network_failure_uses_provider_message() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, notifier) = start_with(&provider).await;
    provider.fail_next(
        ProviderCall::SignInWithPassword,
        ProviderError::Network("connection refused".into()),
    );

    let err = auth.sign_in("bob@x.com", "pw").await.unwrap_err();
    assert!(err.provider_error().unwrap().is_network());
    assert_eq!(notifier.last().unwrap().description, "connection refused");
}

#[tokio::test]
async fn adapter_accepts_calls_after_failure() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("bob@x.com", "pw");
    let (auth, _) = start_with(&provider).await;

    assert!(auth.sign_in("bob@x.com", "bad").await.is_err());
    assert!(auth.sign_in("bob@x.com", "pw").await.is_ok());
    assert!(auth.current_identity().is_some());
}

// ── Sign-out ────────────────────────────────────────────────────

#[tokio::test]
async fn sign_out_clears_state_via_notification() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("bob@x.com", "pw");
    let (auth, _) = start_with(&provider).await;
    auth.sign_in("bob@x.com", "pw").await.unwrap();
    assert!(auth.current_session().is_some());

    auth.sign_out().await;

    assert!(auth.current_identity().is_none());
    assert!(auth.current_session().is_none());
    assert!(!auth.is_privileged());
    assert_paired(&auth);
}

// ── Sign-up ─────────────────────────────────────────────────────

#[tokio::test]
async fn sign_up_requiring_confirmation() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, notifier) = start_with(&provider).await;

    auth.sign_up("carol@x.com", "pw", "Carol").await.unwrap();

    let last = notifier.last().unwrap();
    assert_eq!(last.kind, NotificationKind::Success);
    assert_eq!(last.title, "Account created");
    assert!(auth.current_identity().is_none());
    assert!(!auth.is_loading());
    assert_eq!(
        provider.account_metadata("carol@x.com").unwrap()["display_name"],
        "Carol"
    );
}

#[tokio::test]
async fn sign_up_with_auto_confirm_signs_in() {
    let provider = Arc::new(MemoryIdentityProvider::new().with_auto_confirm(true));
    let (auth, notifier) = start_with(&provider).await;

    auth.sign_up("dave@x.com", "pw", "Dave").await.unwrap();
    let last = notifier.last().unwrap();
    assert_eq!(last.title, "Account created");
    assert!(!last.description.contains("confirm"));

    // display_name metadata is not one of the enhancement sources.
    let identity = auth.current_identity().unwrap();
    assert_eq!(identity.display_name, "dave");
    assert_eq!(identity.role, Role::User);
}

#[tokio::test]
async fn duplicate_sign_up_fails() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("erin@x.com", "pw");
    let (auth, notifier) = start_with(&provider).await;

    let err = auth.sign_up("erin@x.com", "pw", "Erin").await.unwrap_err();
    assert_eq!(err.provider_error().and_then(ProviderError::status), Some(422));
    assert_eq!(notifier.last().unwrap().title, "Sign up failed");
    assert_eq!(notifier.notifications().len(), 1);
}

// ── Federated sign-in ───────────────────────────────────────────

#[tokio::test]
async fn oauth_sign_in_returns_redirect() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, _) = start_with(&provider).await;

    let url = auth.sign_in_with_oauth().await.unwrap();
    assert_eq!(
        url.as_deref(),
        Some("memory://oauth/google?redirect_to=http://localhost:8080/dashboard")
    );
    assert!(auth.current_identity().is_none());
    assert!(!auth.is_loading());

    let user = RawUser::new("g1", Some("gina@x.com"))
        .with_metadata("full_name", "Gina Lovelace")
        .with_metadata("picture", "https://img/g.png");
    provider.emit(AuthChangeEvent::SignedIn, Some(Session::new(user)));

    let identity = auth.current_identity().unwrap();
    assert_eq!(identity.display_name, "Gina Lovelace");
    assert_eq!(identity.photo_url.as_deref(), Some("https://img/g.png"));
}

#[tokio::test]
async fn oauth_failure_is_notified() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, notifier) = start_with(&provider).await;
    provider.fail_next(
        ProviderCall::SignInWithOAuth,
        ProviderError::rejected("Unsupported provider: provider is not enabled"),
    );

    assert!(auth.sign_in_with_oauth().await.is_err());
    assert_eq!(notifier.last().unwrap().title, "Sign in failed");
}

// ── Password reset ──────────────────────────────────────────────

#[tokio::test]
async fn reset_password_sends_email_with_redirect() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, notifier) = start_with(&provider).await;

    auth.reset_password("bob@x.com").await.unwrap();

    let sent = provider.reset_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].redirect_to, "http://localhost:8080/reset-password");
    assert_eq!(notifier.last().unwrap().title, "Password reset email sent");
}

#[tokio::test]
async fn reset_password_failure_propagates() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let (auth, notifier) = start_with(&provider).await;
    provider.fail_next(
        ProviderCall::ResetPassword,
        ProviderError::rejected("For security purposes, you can only request this once every 60 seconds"),
    );

    assert!(auth.reset_password("bob@x.com").await.is_err());
    assert!(notifier.last().unwrap().is_error());
    assert!(provider.reset_emails().is_empty());
}

// ── Role policy ─────────────────────────────────────────────────

#[tokio::test]
async fn custom_role_policy() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.set_session(Some(session_for("admin@x.com")));
    let policy = |_: &RawUser| Role::User;
    let options = AdapterOptions::default().with_role_policy(Arc::new(policy));

    let auth = SessionAdapter::start(provider, options).await.unwrap();
    assert!(!auth.is_privileged());
}

// ── Ordering ────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_operations_are_serialized() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("bob@x.com", "pw");
    let (auth, _) = start_with(&provider).await;

    let gate = provider.hold_sign_in().await;
    let first = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_in("bob@x.com", "pw").await }
    });
    tokio::task::yield_now().await;

    let second = tokio::spawn({
        let auth = auth.clone();
        async move { auth.sign_out().await }
    });
    tokio::task::yield_now().await;

    // Sign-out is queued behind the held sign-in.
    assert!(!provider.calls().contains(&ProviderCall::SignOut));
    assert!(auth.is_loading());

    drop(gate);
    first.await.unwrap().unwrap();
    second.await.unwrap();

    assert_eq!(
        provider.calls(),
        vec![
            ProviderCall::GetSession,
            ProviderCall::SignInWithPassword,
            ProviderCall::SignOut
        ]
    );
    assert!(auth.current_identity().is_none());
    assert!(!auth.is_loading());
}

// ── Guards ──────────────────────────────────────────────────────

#[tokio::test]
async fn guards_follow_identity() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.add_user("bob@x.com", "pw");
    let (auth, _) = start_with(&provider).await;

    let opts = auth.options().clone();
    assert_eq!(
        dashboard_access(&auth.snapshot(), &opts),
        Access::Redirect("/sign-in".into())
    );

    auth.sign_in("bob@x.com", "pw").await.unwrap();
    assert!(dashboard_access(&auth.snapshot(), &opts).is_granted());
    assert_eq!(
        admin_access(&auth.snapshot(), &opts),
        Access::Redirect("/dashboard".into())
    );
}
