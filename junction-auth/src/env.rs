//! A token read from the process environment.

use crate::{AuthError, AuthProvider, AuthRequest, AuthToken};
use async_trait::async_trait;

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvAuthProvider {
    var_name: String,
}

impl EnvAuthProvider {
    /// Read the token from `var_name`.
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    /// The variable this provider reads.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

#[async_trait]
impl AuthProvider for EnvAuthProvider {
    async fn provide(&self, _request: &AuthRequest) -> Result<AuthToken, AuthError> {
        let value = std::env::var_os(&self.var_name).ok_or_else(|| {
            AuthError::Unavailable(format!("env var {} not set", self.var_name))
        })?;
        if value.is_empty() {
            return Err(AuthError::Unavailable(format!(
                "env var {} is empty",
                self.var_name
            )));
        }
        let value = value
            .into_string()
            .map_err(|_| AuthError::Invalid(format!("env var {} is not UTF-8", self.var_name)))?;
        Ok(AuthToken::permanent(value.into_bytes()))
    }
}
