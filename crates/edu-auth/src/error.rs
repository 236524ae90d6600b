//! Error types.
//!
//! `ProviderError` is what an identity provider hands back; `AuthError` is
//! what the adapter's operations return to the view layer.

/// Failure reported by an identity provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connection refused, timeout, TLS).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider understood the request and refused it.
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// The provider's response could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl ProviderError {
    pub fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }

    /// A rejection carrying only a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => *status,
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The message worth showing to a user, if the provider sent one.
    pub fn user_message(&self) -> Option<&str> {
        let message = match self {
            Self::Network(msg) => msg,
            Self::Rejected { message, .. } => message,
            Self::Deserialization(_) => return None,
        };
        Some(message.as_str()).filter(|m| !m.trim().is_empty())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Error returned by `SessionAdapter` operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            Self::Config(_) => None,
        }
    }
}
