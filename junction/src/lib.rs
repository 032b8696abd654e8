#![deny(missing_docs)]
//! The junction daemon.
//!
//! Wires the registry, dispatcher, and stream client together from a
//! [`JunctionConfig`]. The binary calls [`run`]; tests and embedders with
//! their own transport or handlers call [`serve`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod telemetry;

pub use config::{AuthConfig, ConfigError, JunctionConfig, LogConfig, ReconnectConfig};
pub use error::AppError;

use junction_auth::{
    AuthProvider, AuthProviderChain, CachedAuthProvider, EnvAuthProvider, StaticAuthProvider,
};
use junction_dispatch::Dispatcher;
use junction_entity_memory::MemoryEntityStore;
use junction_registry::HandlerRegistry;
use junction_stream::{StreamClient, TcpTransport, Transport};
use junction_types::{EntityStore, HandlerKind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Load the built-in handler modules named in `config`.
pub fn load_registry(
    config: &JunctionConfig,
    store: Arc<dyn EntityStore>,
) -> Result<HandlerRegistry, AppError> {
    let catalog = handlers::builtin_catalog(store);
    let registry = HandlerRegistry::load(&catalog, config.modules.as_slice())?;
    tracing::info!(
        processors = ?registry.names(HandlerKind::Processor),
        criteria = ?registry.names(HandlerKind::Criterion),
        skipped = registry.skipped().len(),
        "handler registry loaded"
    );
    Ok(registry)
}

/// Longest a token without an expiry is reused before the sources are
/// read again.
pub const TOKEN_MAX_AGE: Duration = Duration::from_secs(300);

/// Token supplier for the configured sources, cached across reconnects.
pub fn auth_provider(config: &AuthConfig) -> Arc<dyn AuthProvider> {
    let mut chain = AuthProviderChain::new();
    if let Some(token) = &config.token {
        chain.add(Arc::new(StaticAuthProvider::new(token.as_bytes())));
    }
    if let Some(var) = &config.token_env {
        chain.add(Arc::new(EnvAuthProvider::new(var.clone())));
    }
    Arc::new(CachedAuthProvider::new(Arc::new(chain)).with_max_age(TOKEN_MAX_AGE))
}

/// Run the daemon against the configured TCP endpoint until `shutdown`
/// fires or the engine is unreachable for good.
pub async fn run(config: JunctionConfig, shutdown: CancellationToken) -> Result<(), AppError> {
    config.validate()?;
    let store: Arc<dyn EntityStore> = Arc::new(MemoryEntityStore::new());
    let registry = Arc::new(load_registry(&config, store)?);
    let transport = Arc::new(
        TcpTransport::new(config.endpoint.clone()).with_max_frame_bytes(config.max_frame_bytes),
    );
    serve(&config, registry, transport, shutdown).await
}

/// Run a dispatcher over `registry` fed by `transport`.
pub async fn serve(
    config: &JunctionConfig,
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn Transport>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let mut client = StreamClient::new(
        transport,
        auth_provider(&config.auth),
        config.stream_config(),
    );
    let dispatcher = Dispatcher::new(registry, client.result_sink(), config.dispatch_config());

    tracing::info!(
        endpoint = %config.endpoint,
        worker_pool_size = config.worker_pool_size,
        "junction starting"
    );
    client.run(&dispatcher, &shutdown).await?;
    tracing::info!("junction stopped");
    Ok(())
}
