//! Identity provider backed by a Better-Auth-style REST server.
//!
//! The server cannot push change notifications, so this provider emits them
//! itself after the calls that change the session: a `SIGNED_IN` once a
//! sign-in (or an auto-confirmed sign-up) yields a session, and a
//! `SIGNED_OUT` after sign-out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::provider::{AuthListener, IdentityProvider, ListenerRegistry, Subscription};
use crate::types::{AuthChangeEvent, RawUser, Session, SignUpMetadata};

// ─── Options ───────────────────────────────────────────────────────

/// Connection settings for `HttpIdentityProvider`.
#[derive(Debug, Clone)]
pub struct HttpProviderOptions {
    /// Origin of the auth server (e.g. `https://auth.example.com`).
    pub base_url: String,

    /// Base path for auth endpoints (default: `/api/auth`).
    pub base_path: String,

    /// HTTP request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for HttpProviderOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            base_path: "/api/auth".to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpProviderOptions {
    /// Defaults with `base_url` taken from `EDU_AUTH_URL`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("EDU_AUTH_URL").unwrap_or_default(),
            ..Default::default()
        }
    }
}

// ─── Wire types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SignInBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct SocialSignInBody<'a> {
    provider: &'a str,
    #[serde(rename = "callbackURL")]
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SocialSignInResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody<'a> {
    email: &'a str,
    redirect_to: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    token: Option<String>,
}

/// `{ user, session }` as returned by `GET /get-session`.
#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    user: ServerUser,
    session: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ServerUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<SessionEnvelope> for Session {
    fn from(envelope: SessionEnvelope) -> Self {
        let ServerUser {
            id,
            email,
            name,
            image,
            extra,
        } = envelope.user;

        let mut user = RawUser {
            id,
            email,
            user_metadata: extra,
        };
        if let Some(name) = name {
            user.user_metadata.insert("name".into(), Value::String(name));
        }
        if let Some(image) = image {
            user.user_metadata.insert("avatar_url".into(), Value::String(image));
        }

        let access_token = envelope
            .session
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string);

        Session {
            access_token,
            user,
            extra: envelope.session,
        }
    }
}

// ─── Provider ──────────────────────────────────────────────────────

/// Async HTTP identity provider with a cookie jar for the session cookie.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    listeners: ListenerRegistry,
}

impl HttpIdentityProvider {
    pub fn new(options: HttpProviderOptions) -> Self {
        let cookie_store = Arc::new(reqwest::cookie::Jar::default());

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .cookie_provider(cookie_store)
            .timeout(std::time::Duration::from_secs(options.timeout_secs))
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let base_url = format!(
            "{}{}",
            options.base_url.trim_end_matches('/'),
            options.base_path
        );

        Self {
            http,
            base_url,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Full base URL (base_url + base_path).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(ProviderError::network)?;
        Self::handle_response(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(ProviderError::network)?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ProviderError::network)?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| {
            ProviderError::Deserialization(format!(
                "Failed to deserialize response: {} (body: {})",
                e,
                truncate(body, 200)
            ))
        })
    }

    /// Fetch the session after a state-changing call and notify listeners.
    ///
    /// The call that changed the session already succeeded, so a failed
    /// lookup is only logged; a later probe or notification converges state.
    async fn announce_session(&self, event: AuthChangeEvent) {
        match self.get_session().await {
            Ok(Some(session)) => self.listeners.emit(event, Some(&session)),
            Ok(None) => tracing::debug!(%event, "no session to announce"),
            Err(err) => tracing::warn!(%event, error = %err, "session lookup after auth call failed"),
        }
    }
}

/// Map a non-2xx response to a `ProviderError`, preferring the server's
/// `{ "code", "message" }` body (top-level or under `error`).
fn error_from_response(status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let detail = parsed
        .as_ref()
        .map(|v| v.get("error").filter(|e| e.is_object()).unwrap_or(v));

    let code = detail
        .and_then(|d| d.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = detail
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default_status_message(status).to_string());

    ProviderError::Rejected {
        status: Some(status),
        code,
        message,
    }
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        409 => "Conflict",
        422 => "Unprocessable entity",
        429 => "Too many requests",
        _ => "Server error",
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn subscribe(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let envelope: Option<SessionEnvelope> = self.get_json("/get-session").await?;
        Ok(envelope.map(Session::from))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let _: Value = self
            .post_json("/sign-in/email", &SignInBody { email, password })
            .await?;
        self.announce_session(AuthChangeEvent::SignedIn).await;
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<Option<String>, ProviderError> {
        let resp: SocialSignInResponse = self
            .post_json(
                "/sign-in/social",
                &SocialSignInBody {
                    provider,
                    callback_url: redirect_to,
                },
            )
            .await?;
        Ok(resp.url)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<(), ProviderError> {
        let resp: SignUpResponse = self
            .post_json(
                "/sign-up/email",
                &SignUpBody {
                    email,
                    password,
                    name: &metadata.display_name,
                },
            )
            .await?;
        // A token means the server signed the new account in right away.
        if resp.token.is_some() {
            self.announce_session(AuthChangeEvent::SignedIn).await;
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let _: Value = self.post_json("/sign-out", &serde_json::json!({})).await?;
        self.listeners.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        let _: Value = self
            .post_json("/request-password-reset", &ResetBody { email, redirect_to })
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityProvider")
            .field("base_url", &self.base_url)
            .field("listeners", &self.listeners)
            .finish()
    }
}
