//! Terramino game server entry point.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use terramino_server::api::{create_router, AppState};
use terramino_server::config::Config;
use terramino_server::metrics;
use terramino_server::score::HighScoreService;
use terramino_server::secrets::provider_from_config;
use terramino_server::store::{ConnectionManager, RedisConnector};
use terramino_server::utils::shutdown_signal;

/// Terramino game server.
#[derive(Parser, Debug)]
#[command(name = "terramino")]
#[command(about = "Web backend for the Terramino game with a Redis-backed high score")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default).
    Run {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Resolve store secrets, probe the store and print the high score.
    CheckStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging; configuration errors are reported once logging is up
    let directive = match Config::load() {
        Ok(config) => config.log_directive(args.verbose),
        Err(_) if args.verbose => "terramino_server=debug,info".to_string(),
        Err(_) => "info".to_string(),
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(fmt::layer))
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::Run { port }) => cmd_run(port.or(args.port)).await,
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::CheckStore) => cmd_check_store().await,
        None => cmd_run(args.port).await,
    }
}

/// Make a `print!` prefix visible before the step it announces runs.
fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

/// Load and validate configuration.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Build the connection manager the configuration describes.
fn build_connections(config: &Config) -> anyhow::Result<Arc<ConnectionManager>> {
    let secrets = provider_from_config(config)?;
    let connector = Arc::new(RedisConnector::new(config.store_timeout()));

    Ok(Arc::new(ConnectionManager::new(
        secrets,
        connector,
        config.app_name.clone(),
    )))
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("TERRAMINO - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    flush_stdout();
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    flush_stdout();
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking index template... ");
    flush_stdout();
    let index = config.index_path();
    if index.is_file() {
        println!("OK");
    } else {
        println!("MISSING");
        println!("  WARNING: {} not found, GET / will answer 500", index.display());
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Web Root: {}", config.web_root.display());
    println!("  Secrets Namespace: {}", config.app_name);
    println!(
        "  Secret Source: {}",
        if config.use_hcp() {
            "HCP Vault Secrets"
        } else {
            "Environment variables"
        }
    );
    println!("  Score Key: {}", config.score_key);
    println!("  Store Timeout: {}ms", config.store_timeout_ms);
    println!("  Metrics: {}", if config.metrics_enabled { "Enabled" } else { "Disabled" });
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Resolve store secrets and probe the store.
async fn cmd_check_store() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("TERRAMINO - STORE CHECK");
    println!("======================================================================");

    let config = load_config()?;
    let connections = build_connections(&config)?;

    print!("\n1. Resolving connection parameters... ");
    flush_stdout();
    match connections.connection_params().await {
        Ok(params) => {
            println!("OK");
            println!("   Address: {}", params.address());
            println!(
                "   Password: {}",
                if params.password.is_some() { "present" } else { "none" }
            );
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
            return Err(anyhow::anyhow!("Store secrets unavailable"));
        }
    }

    print!("\n2. Connecting and probing store... ");
    flush_stdout();
    if connections.acquire().await.is_none() {
        println!("FAILED");
        println!("   See log output for the reason.");
        return Err(anyhow::anyhow!("Store unavailable"));
    }
    println!("OK");

    print!("\n3. Reading high score... ");
    flush_stdout();
    let scores = HighScoreService::new(Arc::clone(&connections), config.score_key.clone());
    println!("OK");
    println!("   High score: {}", scores.get_high_score().await);

    println!("\n======================================================================");
    println!("STORE CHECK COMPLETED");
    println!("======================================================================");

    Ok(())
}

/// Run the web server.
async fn cmd_run(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    info!(
        namespace = %config.app_name,
        web_root = %config.web_root.display(),
        hcp = config.use_hcp(),
        "Configuration loaded successfully"
    );

    let connections = build_connections(&config)?;
    let mut app_state = AppState::new(&config, connections);

    if config.metrics_enabled {
        match metrics::install_prometheus() {
            Ok(handle) => app_state = app_state.with_metrics(handle),
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Terramino server is running on http://localhost:{}", config.port);

    let router = create_router(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
