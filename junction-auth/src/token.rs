//! The request a provider answers and the token it hands back.

use crate::AuthError;
use crate::secret::SecretValue;
use std::time::{Duration, SystemTime};

/// The connection a token is wanted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Engine endpoint the token will be presented to.
    pub endpoint: String,
    /// Member id joining the engine.
    pub member_id: String,
}

impl AuthRequest {
    /// Describe a connection of `member_id` to `endpoint`.
    pub fn new(endpoint: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            member_id: member_id.into(),
        }
    }
}

/// A bearer token, with its expiry when the source knows it.
pub struct AuthToken {
    secret: SecretValue,
    issued_at: SystemTime,
    expires_at: Option<SystemTime>,
}

impl AuthToken {
    /// Wrap token bytes that stop being valid at `expires_at`.
    pub fn new(bytes: Vec<u8>, expires_at: Option<SystemTime>) -> Self {
        Self {
            secret: SecretValue::new(bytes),
            issued_at: SystemTime::now(),
            expires_at,
        }
    }

    /// A token with no known expiry.
    pub fn permanent(bytes: Vec<u8>) -> Self {
        Self::new(bytes, None)
    }

    /// Read the token bytes inside `f`.
    pub fn expose<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.secret.expose(f)
    }

    /// The token as UTF-8 text, as the join frame carries it.
    pub fn to_text(&self) -> Result<String, AuthError> {
        self.expose(|bytes| match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_owned()),
            Err(_) => Err(AuthError::Invalid("token is not UTF-8".into())),
        })
    }

    /// When the provider produced this token.
    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    /// When this token expires, if known.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// True once the expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::ZERO)
    }

    /// True if the token expires less than `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expiry) => SystemTime::now() + margin >= expiry,
            None => false,
        }
    }

    /// True if the token was issued more than `age` ago.
    pub fn older_than(&self, age: Duration) -> bool {
        self.issued_at
            .elapsed()
            .is_ok_and(|elapsed| elapsed > age)
    }

    /// A second handle on the same token.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            secret: self.expose(|bytes| SecretValue::new(bytes.to_vec())),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("secret", &self.secret)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
