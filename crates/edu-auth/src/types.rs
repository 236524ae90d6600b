//! Data model shared by the adapter and the providers.
//!
//! `RawUser` and `Session` are provider-shaped and keep unknown fields as
//! JSON so that nothing the provider sends is lost. `Identity` is the
//! enhanced record the view layer consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ─── Provider records ───────────────────────────────────────────────

/// A user record as the identity provider returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    /// Provider-assigned stable identifier.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Free-form profile metadata (`full_name`, `name`, `avatar_url`, ...).
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl RawUser {
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_string),
            user_metadata: Map::new(),
        }
    }

    /// Builder-style helper that sets one metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.user_metadata.insert(key.to_string(), value.into());
        self
    }

    /// Get a metadata entry as a string, if it is one.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key)?.as_str()
    }
}

/// Opaque provider-issued credential bundle.
///
/// The adapter only reads the embedded `user`; tokens are carried through
/// untouched and persistence stays with the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub user: RawUser,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    pub fn new(user: RawUser) -> Self {
        Self {
            access_token: None,
            user,
            extra: Map::new(),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// The provider's id for the user this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Kinds of change notification an identity provider emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Enhanced identity ──────────────────────────────────────────────

/// Authorization role derived locally from the provider user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The enhanced user record used throughout the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub role: Role,
}

// ─── Profile metadata ───────────────────────────────────────────────

/// Profile metadata attached to a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub display_name: String,
}
