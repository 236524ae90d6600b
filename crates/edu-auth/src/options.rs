//! Adapter configuration.

use std::fmt;
use std::sync::Arc;

use crate::enhance::{EmailSubstringPolicy, RolePolicy};
use crate::error::AuthError;
use crate::notify::{Notifier, TracingNotifier};

/// Configuration for a `SessionAdapter`.
#[derive(Clone)]
pub struct AdapterOptions {
    /// Public origin of the application (e.g. `https://learn.example.com`).
    /// Redirect targets handed to the provider are built from it.
    pub site_url: String,

    /// Federated provider used by `sign_in_with_oauth` (default: `google`).
    pub oauth_provider: String,

    pub sign_in_path: String,
    pub dashboard_path: String,
    pub reset_password_path: String,

    /// Where operation outcomes are reported.
    pub notifier: Arc<dyn Notifier>,

    /// Decides each identity's role.
    pub role_policy: Arc<dyn RolePolicy>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8080".to_string(),
            oauth_provider: "google".to_string(),
            sign_in_path: "/sign-in".to_string(),
            dashboard_path: "/dashboard".to_string(),
            reset_password_path: "/reset-password".to_string(),
            notifier: Arc::new(TracingNotifier),
            role_policy: Arc::new(EmailSubstringPolicy::default()),
        }
    }
}

impl AdapterOptions {
    /// Defaults overridden by `EDU_AUTH_SITE_URL` and `EDU_AUTH_OAUTH_PROVIDER`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(url) = std::env::var("EDU_AUTH_SITE_URL") {
            options.site_url = url;
        }
        if let Ok(provider) = std::env::var("EDU_AUTH_OAUTH_PROVIDER") {
            options.oauth_provider = provider;
        }
        options
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_role_policy(mut self, policy: Arc<dyn RolePolicy>) -> Self {
        self.role_policy = policy;
        self
    }

    /// Post-login redirect for federated sign-in.
    pub fn oauth_redirect_url(&self) -> String {
        self.absolute(&self.dashboard_path)
    }

    /// Landing page linked from the password-reset email.
    pub fn password_reset_redirect_url(&self) -> String {
        self.absolute(&self.reset_password_path)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(AuthError::Config(format!(
                "site_url must be an absolute http(s) URL, got {:?}",
                self.site_url
            )));
        }
        if self.oauth_provider.trim().is_empty() {
            return Err(AuthError::Config("oauth_provider must not be empty".into()));
        }
        for path in [&self.sign_in_path, &self.dashboard_path, &self.reset_password_path] {
            if !path.starts_with('/') {
                return Err(AuthError::Config(format!(
                    "route paths must start with '/', got {path:?}"
                )));
            }
        }
        Ok(())
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("site_url", &self.site_url)
            .field("oauth_provider", &self.oauth_provider)
            .field("sign_in_path", &self.sign_in_path)
            .field("dashboard_path", &self.dashboard_path)
            .field("reset_password_path", &self.reset_password_path)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
