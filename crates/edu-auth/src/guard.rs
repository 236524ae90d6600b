//! Route-access decisions for the layouts that wrap auth pages, the
//! dashboard, and the admin area.

use crate::options::AdapterOptions;
use crate::state::AuthState;

/// Outcome of a route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The first session check has not resolved yet; show a spinner.
    Pending,
    Granted,
    /// Navigate elsewhere (replacing the current history entry).
    Redirect(String),
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted)
    }
}

/// Sign-in / sign-up pages: signed-in users go to the dashboard.
pub fn auth_page_access(state: &AuthState, options: &AdapterOptions) -> Access {
    if state.is_loading() {
        return Access::Pending;
    }
    match state.identity() {
        Some(_) => Access::Redirect(options.dashboard_path.clone()),
        None => Access::Granted,
    }
}

/// Dashboard pages: anonymous users go to sign-in.
pub fn dashboard_access(state: &AuthState, options: &AdapterOptions) -> Access {
    if state.is_loading() {
        return Access::Pending;
    }
    match state.identity() {
        Some(_) => Access::Granted,
        None => Access::Redirect(options.sign_in_path.clone()),
    }
}

/// Admin pages: like the dashboard, and non-privileged users are sent back
/// to the dashboard.
pub fn admin_access(state: &AuthState, options: &AdapterOptions) -> Access {
    match dashboard_access(state, options) {
        Access::Granted if !state.is_privileged() => {
            tracing::debug!("non-admin identity denied admin route");
            Access::Redirect(options.dashboard_path.clone())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::EmailSubstringPolicy;
    use crate::state::Action;
    use crate::types::{AuthChangeEvent, RawUser, Session};

    fn settled(email: Option<&str>) -> AuthState {
        let mut state = AuthState::default();
        let session = email.map(|e| Session::new(RawUser::new("u1", Some(e))));
        state.reduce(Action::InitialProbe(session), &EmailSubstringPolicy::default());
        state
    }

    #[test]
    fn test_pending_while_loading() {
        let state = AuthState::default();
        let opts = AdapterOptions::default();
        assert_eq!(auth_page_access(&state, &opts), Access::Pending);
        assert_eq!(dashboard_access(&state, &opts), Access::Pending);
        assert_eq!(admin_access(&state, &opts), Access::Pending);
    }

    #[test]
    fn test_anonymous_user() {
        let state = settled(None);
        let opts = AdapterOptions::default();
        assert!(auth_page_access(&state, &opts).is_granted());
        assert_eq!(
            dashboard_access(&state, &opts),
            Access::Redirect("/sign-in".into())
        );
        assert_eq!(admin_access(&state, &opts), Access::Redirect("/sign-in".into()));
    }

    #[test]
    fn test_regular_user() {
        let state = settled(Some("bob@x.com"));
        let opts = AdapterOptions::default();
        assert_eq!(
            auth_page_access(&state, &opts),
            Access::Redirect("/dashboard".into())
        );
        assert!(dashboard_access(&state, &opts).is_granted());
        assert_eq!(admin_access(&state, &opts), Access::Redirect("/dashboard".into()));
    }

    #[test]
    fn test_admin_user() {
        let state = settled(Some("admin@x.com"));
        let opts = AdapterOptions::default();
        assert!(admin_access(&state, &opts).is_granted());
    }

    #[test]
    fn test_pending_during_sign_in() {
        let mut state = settled(None);
        state.reduce(Action::OperationStarted, &EmailSubstringPolicy::default());
        assert_eq!(
            dashboard_access(&state, &AdapterOptions::default()),
            Access::Pending
        );
        state.reduce(
            Action::SessionChanged {
                event: AuthChangeEvent::SignedIn,
                session: Some(Session::new(RawUser::new("u1", Some("bob@x.com")))),
            },
            &EmailSubstringPolicy::default(),
        );
        state.reduce(Action::OperationFinished, &EmailSubstringPolicy::default());
        assert!(dashboard_access(&state, &AdapterOptions::default()).is_granted());
    }
}
