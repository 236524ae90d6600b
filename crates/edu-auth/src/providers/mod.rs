//! Identity provider implementations.

pub mod http;
pub mod memory;

pub use http::{HttpIdentityProvider, HttpProviderOptions};
pub use memory::{MemoryIdentityProvider, ProviderCall, SentResetEmail};
