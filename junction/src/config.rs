//! Daemon configuration, read from a JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use junction_dispatch::DispatchConfig;
use junction_stream::{DEFAULT_MAX_FRAME_BYTES, ReconnectPolicy, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default engine address.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:7700";

/// Default environment variable holding the engine token.
pub const DEFAULT_TOKEN_ENV: &str = "JUNCTION_TOKEN";

/// Configuration file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "junction.json";

/// Errors from loading or validating a [`JunctionConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JunctionConfig {
    /// Engine address, `host:port`.
    pub endpoint: String,
    /// Member id sent when joining. A random one is generated when unset.
    pub member_id: Option<String>,
    /// Handler modules to load, by identifier.
    pub modules: Vec<String>,
    /// Routing tags sent when joining.
    pub tags: Vec<String>,
    /// Upper bound on concurrently running handlers.
    pub worker_pool_size: usize,
    /// Deadline for handlers that declare none.
    pub handler_timeout_ms: u64,
    /// Time allowed for in-flight work during shutdown.
    pub drain_timeout_ms: u64,
    /// Connection retry settings.
    pub reconnect: ReconnectConfig,
    /// Longest accepted inbound line.
    pub max_frame_bytes: usize,
    /// Where the engine token comes from.
    pub auth: AuthConfig,
    /// Log output.
    pub log: LogConfig,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            member_id: None,
            modules: vec!["core".to_string()],
            tags: Vec::new(),
            worker_pool_size: dispatch.worker_pool_size,
            handler_timeout_ms: millis(dispatch.handler_timeout),
            drain_timeout_ms: millis(junction_stream::DEFAULT_DRAIN_TIMEOUT),
            reconnect: ReconnectConfig::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            auth: AuthConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Retry settings for the engine connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Cap on any single delay.
    pub max_backoff_ms: u64,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            initial_backoff_ms: millis(policy.initial_backoff),
            max_backoff_ms: millis(policy.max_backoff),
            max_attempts: policy.max_attempts,
        }
    }
}

/// Token sources, tried in order: the literal token, then the variable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Literal token.
    pub token: Option<String>,
    /// Environment variable holding the token.
    pub token_env: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: Some(DEFAULT_TOKEN_ENV.to_string()),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_env", &self.token_env)
            .finish()
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl JunctionConfig {
    /// Read and parse a configuration file. Does not validate.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or the default file when present, or the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_path(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_path(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if self.worker_pool_size == 0 {
            return Err(ConfigError::Invalid("worker_pool_size must be at least 1".into()));
        }
        if self.handler_timeout_ms == 0 {
            return Err(ConfigError::Invalid("handler_timeout_ms must be positive".into()));
        }
        if self.drain_timeout_ms == 0 {
            return Err(ConfigError::Invalid("drain_timeout_ms must be positive".into()));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".into(),
            ));
        }
        if self.reconnect.initial_backoff_ms > self.reconnect.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "reconnect.initial_backoff_ms exceeds reconnect.max_backoff_ms".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid("max_frame_bytes must be positive".into()));
        }
        if self.auth.token.is_none() && self.auth.token_env.is_none() {
            return Err(ConfigError::Invalid(
                "auth needs a token or a token_env".into(),
            ));
        }
        Ok(())
    }

    /// Dispatcher settings.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            worker_pool_size: self.worker_pool_size,
            handler_timeout: Duration::from_millis(self.handler_timeout_ms),
        }
    }

    /// Connection retry policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(self.reconnect.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.reconnect.max_backoff_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    /// Stream client settings. Generates the member id when unset, so call
    /// once per client.
    pub fn stream_config(&self) -> StreamConfig {
        let member_id = self
            .member_id
            .clone()
            .unwrap_or_else(|| format!("junction-{}", uuid::Uuid::new_v4()));
        StreamConfig {
            member_id,
            tags: self.tags.clone(),
            reconnect: self.reconnect_policy(),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = JunctionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.worker_pool_size, 16);
        assert_eq!(config.handler_timeout_ms, 30_000);
        assert_eq!(config.drain_timeout_ms, 10_000);
        assert_eq!(config.reconnect.initial_backoff_ms, 250);
        assert_eq!(config.reconnect.max_backoff_ms, 30_000);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.max_frame_bytes, 1024 * 1024);
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let config: JunctionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JunctionConfig::default());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = serde_json::from_str::<JunctionConfig>(r#"{"workers": 4}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn zero_pool_is_invalid() {
        let config = JunctionConfig {
            worker_pool_size: 0,
            ..JunctionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_token_source_is_invalid() {
        let config = JunctionConfig {
            auth: AuthConfig {
                token: None,
                token_env: None,
            },
            ..JunctionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid config: auth needs a token or a token_env");
    }

    #[test]
    fn generated_member_id_is_prefixed() {
        let stream = JunctionConfig::default().stream_config();
        assert!(stream.member_id.starts_with("junction-"));
    }

    #[test]
    fn auth_debug_hides_token() {
        let auth = AuthConfig {
            token: Some("hunter2".into()),
            token_env: None,
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
