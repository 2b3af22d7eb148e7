//! Subscription API entry point.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subscription_api::api::{create_router, AppState};
use subscription_api::config::Config;
use subscription_api::error::{AppError, UpdateError};
use subscription_api::metrics;
use subscription_api::singbox::SingBoxCli;
use subscription_api::subconverter::SubconverterClient;
use subscription_api::subscription::{spawn_auto_update, SubscriptionService};
use subscription_api::utils::shutdown_signal;

/// Log file name inside `LOG_DIR`.
const LOG_FILE: &str = "subscription-api.log";

/// Proxy subscription service.
#[derive(Parser, Debug)]
#[command(name = "subscription-api")]
#[command(about = "Builds proxy subscriptions from sing-box nodes and converts them via subconverter")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Run one update cycle and print the summary.
    Update,

    /// Print artifact and dependency status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration decides where logs go, so load it before logging starts
    let loaded = Config::load();
    let _log_guard = init_tracing(loaded.as_ref().ok(), args.verbose);

    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config).await,
        Some(Command::Update) => cmd_update(config).await,
        Some(Command::Status) => cmd_status(config).await,
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        None => cmd_serve(config, args.port).await,
    }
}

/// Console logging plus a daily-rotated file in `LOG_DIR`.
fn init_tracing(config: Option<&Config>, verbose: bool) -> Option<WorkerGuard> {
    let filter = if verbose {
        EnvFilter::new("subscription_api=debug,info")
    } else {
        let default_level = config.map(|c| c.log_level.as_str()).unwrap_or("info");
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level.to_lowercase()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let mut guard = None;
    let file_layer = config.and_then(|config| {
        let log_dir = config.log_dir();
        match std::fs::create_dir_all(log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard = Some(file_guard);
                Some(fmt::layer().with_writer(writer).with_ansi(false))
            }
            Err(e) => {
                eprintln!("Warning: failed to create log directory {}: {}", log_dir.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Check configuration validity.
async fn cmd_check_config(config: Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("SUBSCRIPTION API - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking sing-box... ");
    if SingBoxCli::new(&config).is_accessible().await {
        println!("OK");
    } else {
        println!("NOT ACCESSIBLE");
        println!("  '{}' could not be executed", config.sing_box_bin);
    }

    print!("Checking subconverter... ");
    match SubconverterClient::new(&config).version().await {
        Ok(version) => {
            println!("OK");
            println!("  Version: {}", version);
        }
        Err(e) => {
            println!("NOT RUNNING");
            println!("  Error: {}", e);
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Configs: {}", config.sing_box_configs.join(", "));
    println!("  sing-box: {}", config.sing_box_bin);
    println!("  subconverter: {}", config.subconverter_url);
    println!("  Callback URL: {}", config.callback_url());
    println!("  Static Dir: {}", config.static_dir.display());
    println!("  Backup Dir: {}", config.backup_dir().display());
    println!("  Log Dir: {}", config.log_dir().display());
    println!("  Request Timeout: {}ms", config.request_timeout);
    match config.auto_update_interval() {
        Some(interval) => println!("  Auto Update: every {}s", interval.as_secs()),
        None => println!("  Auto Update: disabled"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run one update cycle and print the summary.
async fn cmd_update(config: Config) -> anyhow::Result<()> {
    let config = config.validated()?;

    let service = SubscriptionService::new(&config);
    match service.update(&config.sing_box_configs).await {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            if let UpdateError::NoNodes { details } = &e {
                for detail in details {
                    println!("  - {}", detail);
                }
            }
            Err(AppError::from(e).into())
        }
    }
}

/// Print artifact and dependency status.
async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let service = SubscriptionService::new(&config);
    let report = service.status().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run the HTTP server.
async fn cmd_serve(mut config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.port = port;
    }

    // Validate configuration
    let config = config.validated().map_err(|e| {
        error!("{}", e);
        e
    })?;

    metrics::init_metrics();

    tokio::fs::create_dir_all(&config.static_dir).await?;
    tokio::fs::create_dir_all(config.backup_dir()).await?;

    info!("Configuration loaded successfully");
    info!("Configs: {}", config.sing_box_configs.join(", "));
    info!("subconverter: {}", config.subconverter_url);
    info!("Static dir: {}", config.static_dir.display());
    debug!("Max retries: {} (not applied)", config.max_retries);

    // Create app state
    let app_state = AppState::new(&config);

    let scheduler = config.auto_update_interval().map(|interval| {
        spawn_auto_update(app_state.service.clone(), app_state.configs.clone(), interval)
    });

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }

    info!("Server stopped");
    Ok(())
}
