use clap::Parser;
use junction::{AppError, JunctionConfig, run, telemetry};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Connects to the workflow engine and answers its events with the
/// built-in handlers.
#[derive(Parser, Debug)]
#[command(name = "junction", version)]
struct Cli {
    /// Configuration file. Defaults to `junction.json` when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Engine address, overriding the configuration.
    #[arg(long, value_name = "HOST:PORT")]
    endpoint: Option<String>,
    /// Handler module to load. Repeat for several; replaces the configured list.
    #[arg(long = "module", value_name = "ID")]
    modules: Vec<String>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("junction error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut config = JunctionConfig::discover(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if !cli.modules.is_empty() {
        config.modules = cli.modules;
    }
    if cli.json_log {
        config.log.json = true;
    }
    config.validate()?;
    telemetry::init(&config.log)?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, draining");
                signal.cancel();
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for interrupt"),
        }
    });

    run(config, shutdown).await
}
