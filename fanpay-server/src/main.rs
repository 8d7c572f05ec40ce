//! Fanpay Server
//!
//! Money movement for a creator platform: payments, revenue splits,
//! creator payouts and the operator console.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::runtime::SharedConfig;
use config::{ConfigLoader, get_database_url, get_gateway_secret};
use fanpay_core::Engine;
use fanpay_core::gateway::HttpPaymentGateway;
use fanpay_core::store::PgLedgerStore;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Fanpay - creator payments and payouts engine
#[derive(Parser, Debug)]
#[command(name = "fanpay-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./fanpay-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "FANPAY_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting fanpay-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;
    let gateway_secret = get_gateway_secret().map_err(|e| {
        tracing::error!("FANPAY_GATEWAY_SECRET_KEY environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(PgLedgerStore::new(db_pool.clone()));
    let gateway = Arc::new(HttpPaymentGateway::new(
        loaded_config.gateway.base_url.clone(),
        gateway_secret,
    ));
    let engine = Arc::new(Engine::new(loaded_config.engine, store, gateway)?);

    // Fail fast when a collaborator is unreachable
    engine.validate_collaborators().await.map_err(|e| {
        tracing::error!("Startup validation failed: {}", e.detail());
        e
    })?;

    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = watch::channel(false);
    let scheduler_handle = engine.spawn_scheduler(scheduler_shutdown_rx);

    let state = AppState::new(
        engine,
        SharedConfig::new(loaded_config.admin, loaded_config.service),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    shutdown_notify.notify_one();

    // Stop the scheduler before the pool goes away
    let _ = scheduler_shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!("Scheduler task ended abnormally: {}", e);
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
