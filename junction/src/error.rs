//! Errors that stop the daemon.

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use junction_registry::RegistryError;
use junction_stream::StreamError;

/// A fatal daemon error. The binary prints it and exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The handler registry could not be built.
    #[error("handler registry: {0}")]
    Registry(#[from] RegistryError),

    /// The engine connection failed for good.
    #[error("engine stream: {0}")]
    Stream(#[from] StreamError),
}
