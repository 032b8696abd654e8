#![deny(missing_docs)]
//! Credentials for the engine connection.
//!
//! The stream client asks an [`AuthProvider`] for a token on every
//! connection attempt and presents it in the join frame, so a rotated or
//! refreshed credential takes effect on the next reconnect.
//!
//! | Provider | Source |
//! |----------|--------|
//! | [`StaticAuthProvider`] | a token fixed at startup |
//! | [`EnvAuthProvider`] | an environment variable, read per call |
//! | [`AuthProviderChain`] | the first of several that yields a token |
//! | [`CachedAuthProvider`] | another provider's last token, until it goes stale |

mod cached;
mod chain;
mod env;
mod secret;
mod static_provider;
mod token;

pub use cached::{CachedAuthProvider, DEFAULT_REFRESH_MARGIN};
pub use chain::AuthProviderChain;
pub use env::EnvAuthProvider;
pub use secret::SecretValue;
pub use static_provider::StaticAuthProvider;
pub use token::{AuthRequest, AuthToken};

use async_trait::async_trait;

/// Why no token could be produced.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The source has no credential to give.
    #[error("credential unavailable: {0}")]
    Unavailable(String),

    /// A credential was found but cannot be used.
    #[error("credential invalid: {0}")]
    Invalid(String),

    /// Any other failure.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Supplies the token presented to the engine when joining.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Produce a token for the connection described by `request`.
    async fn provide(&self, request: &AuthRequest) -> Result<AuthToken, AuthError>;
}
