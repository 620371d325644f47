//! Wikigate CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wikigate_config::{load_config, Config, LogFormat};
use wikigate_middleware::install_panic_hook;
use wikigate_runtime::{OsSignals, ServerBuilder, SignalHandler, SignalOutcome};

#[derive(Parser)]
#[command(name = "wikigate")]
#[command(about = "Wikigate API Gateway", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the gateway (start the server)
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "wikigate.toml", env = "WIKIGATE_CONFIG")]
        config: PathBuf,

        /// Log level, overriding the configured one (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "wikigate.toml", env = "WIKIGATE_CONFIG")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, log_level } => serve(&config, log_level).await,
        Commands::Validate { config } => validate(&config),
        Commands::Version => {
            println!("Wikigate API Gateway");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(path: &Path, log_level: Option<String>) -> Result<()> {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(log_level.as_deref().unwrap_or("info"), LogFormat::Text)?;
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to load configuration from {}", path.display())));
        }
    };

    let logging = &config.observability.logging;
    init_tracing(
        log_level.as_deref().unwrap_or(&logging.level),
        logging.format,
    )?;
    install_panic_hook();

    tracing::info!(
        config = %path.display(),
        listen = %config.gateway.listen,
        services = config.services.len(),
        "Starting Wikigate API Gateway"
    );

    let server = ServerBuilder::new().config(config).build()?;

    let mut signals = tokio::spawn(
        SignalHandler::new(OsSignals::new()?, server.shutdown_signal()).run(),
    );

    let run = server.run();
    tokio::pin!(run);
    let mut listening = true;

    loop {
        tokio::select! {
            result = &mut run => {
                signals.abort();
                result?;
                break;
            }
            outcome = &mut signals, if listening => {
                listening = false;
                if let Ok(SignalOutcome::Forced) = outcome {
                    tracing::error!(
                        in_flight = server.in_flight(),
                        "Forced exit before in-flight requests completed"
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    tracing::info!("Validating configuration: {}", path.display());

    let config = load_config(path).map_err(|e| {
        anyhow::Error::new(e).context(format!("{} is not a valid configuration", path.display()))
    })?;

    print_summary(&config);
    Ok(())
}

fn print_summary(config: &Config) {
    tracing::info!("Configuration is valid");
    tracing::info!("  Listen: {}", config.gateway.listen);
    tracing::info!("  Request timeout: {:?}", config.gateway.request_timeout);
    tracing::info!("  Shutdown timeout: {:?}", config.gateway.shutdown_timeout);
    for (service, url) in &config.services {
        tracing::info!("  {} -> {}", config.service_prefix(service), url);
    }
}

/// Install the global subscriber; `RUST_LOG`, when set, wins over `level`
fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?,
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .try_init()?,
    }

    Ok(())
}
