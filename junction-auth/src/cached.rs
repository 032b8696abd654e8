//! Reusing a token across connection attempts.

use crate::{AuthError, AuthProvider, AuthRequest, AuthToken};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long before expiry a cached token is replaced.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Hands out the wrapped provider's last token until it goes stale.
///
/// A token is stale within the refresh margin of its expiry or, when a
/// maximum age is set, once it is older than that. Tokens without an
/// expiry and without a maximum age are kept until
/// [`invalidate`](Self::invalidate). Concurrent callers wait for a single
/// refresh. The request is not part of the cache key.
pub struct CachedAuthProvider {
    inner: Arc<dyn AuthProvider>,
    refresh_margin: Duration,
    max_age: Option<Duration>,
    current: Mutex<Option<AuthToken>>,
}

impl CachedAuthProvider {
    /// Cache tokens produced by `inner`.
    pub fn new(inner: Arc<dyn AuthProvider>) -> Self {
        Self {
            inner,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            max_age: None,
            current: Mutex::new(None),
        }
    }

    /// Replace tokens this long before they expire.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Replace tokens once they are older than `age`, expiry or not.
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Forget the cached token.
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }

    fn is_stale(&self, token: &AuthToken) -> bool {
        token.expires_within(self.refresh_margin)
            || self.max_age.is_some_and(|age| token.older_than(age))
    }
}

#[async_trait]
impl AuthProvider for CachedAuthProvider {
    async fn provide(&self, request: &AuthRequest) -> Result<AuthToken, AuthError> {
        let mut current = self.current.lock().await;
        match current.as_ref() {
            Some(token) if !self.is_stale(token) => return Ok(token.duplicate()),
            Some(_) => tracing::debug!(endpoint = %request.endpoint, "refreshing stale engine token"),
            None => {}
        }

        let fresh = self.inner.provide(request).await?;
        let handed_out = fresh.duplicate();
        *current = Some(fresh);
        Ok(handed_out)
    }
}
