//! Falling back across credential sources.

use crate::{AuthError, AuthProvider, AuthRequest, AuthToken};
use async_trait::async_trait;
use std::sync::Arc;

/// Asks each provider in turn and returns the first token produced.
///
/// When every provider fails, the error names each failure in order.
#[derive(Default)]
pub struct AuthProviderChain {
    providers: Vec<Arc<dyn AuthProvider>>,
}

impl AuthProviderChain {
    /// An empty chain. It fails every request until a provider is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `provider` (builder style).
    pub fn with_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.add(provider);
        self
    }

    /// Append `provider`.
    pub fn add(&mut self, provider: Arc<dyn AuthProvider>) {
        self.providers.push(provider);
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True if no provider was added.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl AuthProvider for AuthProviderChain {
    async fn provide(&self, request: &AuthRequest) -> Result<AuthToken, AuthError> {
        let mut failures = Vec::with_capacity(self.providers.len());
        for (position, provider) in self.providers.iter().enumerate() {
            match provider.provide(request).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    tracing::debug!(position, error = %err, "credential source failed");
                    failures.push(err.to_string());
                }
            }
        }
        if failures.is_empty() {
            return Err(AuthError::Unavailable("no credential source configured".into()));
        }
        Err(AuthError::Unavailable(format!(
            "every credential source failed: {}",
            failures.join("; ")
        )))
    }
}
