//! A token fixed at startup.

use crate::{AuthError, AuthProvider, AuthRequest, AuthToken, SecretValue};
use async_trait::async_trait;

/// Hands out the same token for every connection. Backs a token written
/// into the config file.
pub struct StaticAuthProvider {
    token: SecretValue,
}

impl StaticAuthProvider {
    /// Serve `token` forever.
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Self {
            token: SecretValue::new(token.into()),
        }
    }
}

impl std::fmt::Debug for StaticAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticAuthProvider").field(&self.token).finish()
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn provide(&self, _request: &AuthRequest) -> Result<AuthToken, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::Unavailable("configured token is empty".into()));
        }
        Ok(AuthToken::permanent(self.token.expose(<[u8]>::to_vec)))
    }
}
