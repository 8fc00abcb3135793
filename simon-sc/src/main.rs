//! Score Collector (simon-sc) - Main entry point
//!
//! Bridges the Simon device fleet to the web layer: subscribes to the
//! score and pairing-ack topics on the MQTT bus, merges incoming scores
//! into the append-only score log, and publishes pairing requests on
//! demand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simon_common::config::{BrokerConfig, RootFolderInitializer, RootFolderResolver};
use simon_common::ScoreLog;
use simon_sc::broker::BrokerClient;
use simon_sc::config::Config;
use simon_sc::ingest::Dispatcher;
use simon_sc::pairing::{PairingPublisher, PairingRegistry};
use tokio::signal;
use tracing::info;

/// Command-line arguments for simon-sc
#[derive(Parser, Debug)]
#[command(name = "simon-sc")]
#[command(about = "Score Collector service for the Simon bridge")]
#[command(version)]
struct Args {
    /// Root folder holding the score log
    #[arg(short, long, env = "SIMON_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Broker host, overriding the config file
    #[arg(long, env = "SIMON_BROKER_HOST")]
    broker_host: Option<String>,

    /// Broker port, overriding the config file
    #[arg(long, env = "SIMON_BROKER_PORT")]
    broker_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector daemon (default)
    Run,
    /// Print the most recent score records as JSON and exit
    Recent {
        /// Maximum number of records to print
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },
    /// Publish one pairing request and exit
    Pair {
        /// Network name the device should join
        #[arg(long)]
        ssid: String,
        /// Network password, passed through to the device
        #[arg(long)]
        password: String,
        /// User claiming the device
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `recent` output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting Simon Score Collector (simon-sc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let resolver = RootFolderResolver::with_cli_arg("simon-sc", args.root_folder.clone());
    let root_folder = resolver.resolve();

    let mut broker = resolver.load_config().broker;
    if let Some(host) = args.broker_host.clone() {
        broker.host = host;
    }
    if let Some(port) = args.broker_port {
        broker.port = port;
    }

    let initializer = RootFolderInitializer::new(root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let config = Config {
        root_folder,
        store_path: initializer.score_log_path(),
        broker,
    };
    info!("Score log: {}", config.store_path.display());

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_collector(&config).await,
        Command::Recent { count } => print_recent(&config, count),
        Command::Pair {
            ssid,
            password,
            username,
        } => publish_pairing(&config.broker, &ssid, &password, &username).await,
    }
}

/// Run the collector daemon until ctrl-c or SIGTERM
async fn run_collector(config: &Config) -> Result<()> {
    let log = Arc::new(ScoreLog::new(config.store_path.clone()));
    info!("Score log contains {} record(s)", log.load().len());

    let registry = Arc::new(PairingRegistry::new());
    let dispatcher = Dispatcher::new(Arc::clone(&log), registry);

    // Client ids must be unique per connection or the broker drops the
    // older session.
    let client_id = format!("simon-sc-{}", std::process::id());
    let broker = BrokerClient::start(&config.broker, &client_id, dispatcher);

    info!(
        "Collecting scores from {}:{}",
        config.broker.host, config.broker.port
    );

    shutdown_signal().await;
    info!("Shutting down");
    broker.stop().await;

    Ok(())
}

/// Print the `count` most recent records, newest first, as JSON
fn print_recent(config: &Config, count: usize) -> Result<()> {
    let log = ScoreLog::new(config.store_path.clone());
    let records = log.read_recent(count);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Publish a single pairing request over a short-lived connection
async fn publish_pairing(
    broker: &BrokerConfig,
    ssid: &str,
    password: &str,
    username: &str,
) -> Result<()> {
    let client_id = format!("simon-sc-pair-{}", std::process::id());
    let mut options = rumqttc::MqttOptions::new(client_id, broker.host.as_str(), broker.port);
    options.set_keep_alive(Duration::from_secs(broker.keepalive_secs));
    let (client, mut event_loop) = rumqttc::AsyncClient::new(options, 4);

    let registry = Arc::new(PairingRegistry::new());
    let publisher = PairingPublisher::new(client.clone(), registry);
    publisher
        .request_pairing(ssid, password, username)
        .await
        .context("Failed to queue pairing request")?;

    // The event loop still has to be polled for the message to reach the
    // wire; drive it until the publish goes out.
    let flush = async {
        loop {
            match event_loop.poll().await {
                Ok(rumqttc::Event::Outgoing(rumqttc::Outgoing::Publish(_))) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(anyhow::anyhow!("Broker unreachable: {}", e)),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), flush)
        .await
        .context("Timed out flushing pairing request")??;

    let _ = client.disconnect().await;
    info!("Pairing request sent for user '{}'", username);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
