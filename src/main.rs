// ABOUTME: Main entry point for quatbot with the Matrix sync loop
// ABOUTME: Initializes logging, config, metrics and the Matrix client, then runs one bot per room

use anyhow::{Context, Result};
use clap::Parser;
use matrix_sdk::config::SyncSettings;
use quatbot::{config::Config, matrix_client, matrix_room, paths};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Meeting bot for Matrix rooms
#[derive(Parser, Debug)]
#[command(name = "quatbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: QUATBOT_CONFIG_PATH, ./config.toml, then the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra operator for every room (repeatable)
    #[arg(short = 'o', long = "operator")]
    operators: Vec<String>,

    /// Log to stderr as JSON
    #[arg(long)]
    json_logs: bool,

    /// Rooms to join, by id or alias, in addition to the configured ones
    rooms: Vec<String>,
}

fn init_logging(json: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(paths::log_dir(), "quatbot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,matrix_sdk_crypto=error".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

fn init_metrics(listen: &str) -> Result<()> {
    let addr: std::net::SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid metrics listen address: {listen}"))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to start Prometheus exporter")?;
    tracing::info!(listen = %addr, "Prometheus exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.json_logs);

    tracing::info!("Starting quatbot");

    dotenvy::dotenv().ok();
    let mut config = Config::load_from(cli.config.as_deref())?;
    config.bot.rooms.extend(cli.rooms);
    config.bot.operators.extend(cli.operators);
    config.validate()?;

    let matrix = config.matrix_config()?.clone();
    if config.bot.rooms.is_empty() {
        anyhow::bail!("No rooms to join (set bot.rooms, QUATBOT_ROOMS or pass room names)");
    }

    tracing::info!(
        homeserver = %matrix.home_server,
        user_id = %matrix.user_id,
        rooms = config.bot.rooms.len(),
        operators = config.bot.operators.len(),
        "Configuration loaded"
    );

    if let Some(listen) = config.metrics.listen.as_deref() {
        init_metrics(listen)?;
    }

    let client =
        matrix_client::create_client(&matrix.home_server, &paths::crypto_store_dir()).await?;
    matrix_client::login(&client, &matrix).await?;

    // Initial sync so that rooms, members and device keys are known; messages
    // from before startup are not handed to the bots.
    tracing::info!("Performing initial sync...");
    let response = client
        .sync_once(SyncSettings::default())
        .await
        .context("Initial sync failed")?;
    tracing::info!("Initial sync complete");

    let config = Arc::new(config);
    let mut rooms = JoinSet::new();
    for name in config.bot.rooms.clone() {
        let client = client.clone();
        let config = Arc::clone(&config);
        rooms.spawn(async move {
            match matrix_room::serve(client, config, name.clone()).await {
                Ok(exit) => tracing::info!(room = %name, ?exit, "Room finished"),
                Err(e) => tracing::error!(room = %name, error = %e, "Room failed"),
            }
        });
    }

    let settings = SyncSettings::default().token(response.next_batch);
    tracing::info!("Starting continuous sync loop");
    tokio::select! {
        result = client.sync(settings) => result.context("Sync loop failed")?,
        _ = async { while rooms.join_next().await.is_some() {} } => {
            tracing::info!("All rooms finished, exiting");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, exiting");
        }
    }

    Ok(())
}
