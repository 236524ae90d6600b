//! Identity enhancement: the pure derivation from a provider user record to
//! the `Identity` the view layer renders.

use crate::types::{Identity, RawUser, Role};

/// Display name used when neither metadata nor email yield one.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Decides the role of a provider user.
///
/// The default (`EmailSubstringPolicy`) is a placeholder rule; swap in a
/// policy backed by a provider claim or a server-side table when one exists.
pub trait RolePolicy: Send + Sync {
    fn role_for(&self, user: &RawUser) -> Role;
}

impl<F> RolePolicy for F
where
    F: Fn(&RawUser) -> Role + Send + Sync,
{
    fn role_for(&self, user: &RawUser) -> Role {
        self(user)
    }
}

/// Grants `Role::Admin` when the email contains a fixed substring.
/// The match is case-sensitive.
#[derive(Debug, Clone)]
pub struct EmailSubstringPolicy {
    needle: String,
}

impl EmailSubstringPolicy {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl Default for EmailSubstringPolicy {
    fn default() -> Self {
        Self::new("admin")
    }
}

impl RolePolicy for EmailSubstringPolicy {
    fn role_for(&self, user: &RawUser) -> Role {
        match user.email.as_deref() {
            Some(email) if email.contains(self.needle.as_str()) => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Enhance a provider user with the default role policy.
pub fn enhance_user(user: &RawUser) -> Identity {
    enhance_user_with(user, &EmailSubstringPolicy::default())
}

/// Enhance a provider user.
///
/// - `display_name`: `full_name` metadata, then `name` metadata, then the
///   email local-part, then `"User"`. Empty strings are skipped.
/// - `photo_url`: `avatar_url` metadata, then `picture` metadata.
pub fn enhance_user_with(user: &RawUser, policy: &dyn RolePolicy) -> Identity {
    let email = user.email.clone().unwrap_or_default();

    let display_name = first_non_empty([
        user.metadata_str("full_name"),
        user.metadata_str("name"),
        email.split('@').next(),
    ])
    .unwrap_or(FALLBACK_DISPLAY_NAME)
    .to_string();

    let photo_url = first_non_empty([
        user.metadata_str("avatar_url"),
        user.metadata_str("picture"),
    ])
    .map(str::to_string);

    Identity {
        id: user.id.clone(),
        email,
        display_name,
        photo_url,
        role: policy.role_for(user),
    }
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}
