//! # EduEngineer auth
//!
//! Headless session adapter for the EduEngineer course dashboard. It mirrors
//! an external identity provider's session into local, observable state and
//! mediates sign-in, federated sign-in, sign-up, sign-out and password-reset
//! requests.
//!
//! - Identity and session are written only by the provider's change
//!   notifications and the startup probe; operations merely ask the
//!   provider to act and toggle `loading`.
//! - Each session user is enhanced into an [`Identity`] with a display name,
//!   photo URL and [`Role`]; `is_privileged` is derived from that role.
//! - Operations on one adapter run one at a time, in call order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edu_auth::{AdapterOptions, HttpIdentityProvider, HttpProviderOptions, SessionAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     edu_auth::env::init_logger();
//!
//!     let provider = Arc::new(HttpIdentityProvider::new(HttpProviderOptions::from_env()));
//!     let auth = SessionAdapter::start(provider, AdapterOptions::from_env()).await?;
//!
//!     auth.sign_in("alice@example.com", "password123").await?;
//!
//!     // The identity arrives through the provider's notification.
//!     let mut changes = auth.watch();
//!     changes.wait_for(|state| state.identity().is_some()).await?;
//!     println!("signed in as {:?}", auth.current_identity());
//!
//!     auth.sign_out().await;
//!     Ok(())
//! }
//! ```

mod adapter;
pub mod enhance;
pub mod env;
mod error;
pub mod guard;
mod notify;
mod options;
pub mod provider;
pub mod providers;
mod state;
mod types;

pub use adapter::SessionAdapter;
pub use enhance::{enhance_user, enhance_user_with, EmailSubstringPolicy, RolePolicy};
pub use error::{AuthError, ProviderError};
pub use guard::Access;
pub use notify::{Notification, NotificationKind, Notifier, RecordingNotifier, TracingNotifier};
pub use options::AdapterOptions;
pub use provider::{AuthListener, IdentityProvider, ListenerRegistry, Subscription};
pub use providers::{HttpIdentityProvider, HttpProviderOptions, MemoryIdentityProvider};
pub use state::{Action, AuthState, Authenticated};
pub use types::{AuthChangeEvent, Identity, RawUser, Role, Session, SignUpMetadata};
