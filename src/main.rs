//! Sprinkler Bridge - Main Entry Point
//!
//! Loads configuration, acquires the relay hardware, and runs the bridge
//! until interrupted.

use clap::{Parser, Subcommand};
use sprinkler_bridge::command::CommandDispatcher;
use sprinkler_bridge::config::BridgeConfig;
use sprinkler_bridge::error::BridgeResult;
use sprinkler_bridge::gpio::{Gpio, RppalGpio, SimulatedGpio};
use sprinkler_bridge::lifecycle::{wait_for_shutdown_signal, BridgeLifecycle, ShutdownReason};
use sprinkler_bridge::observability::init_default_logging;
use sprinkler_bridge::relay::{OutputController, RelayMap};
use sprinkler_bridge::transport::mqtt::{ConnectionSupervisor, MqttSession, ReconnectPolicy};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

/// MQTT to GPIO relay bridge for Raspberry Pi irrigation controllers
#[derive(Parser)]
#[command(name = "sprinkler-bridge")]
#[command(about = "Drive relay outputs from MQTT commands")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge
    Run {
        /// Log GPIO writes instead of driving the relay board
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting sprinkler bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { dry_run } => run_bridge(config, dry_run).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    // Only failures before the relays were acquired end up here
    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(path: Option<&std::path::Path>) -> BridgeResult<BridgeConfig> {
    let (config, source) = BridgeConfig::discover(path)?;
    match source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }
    Ok(config)
}

async fn run_bridge(config: BridgeConfig, dry_run: bool) -> BridgeResult<()> {
    let relays = config.relays.relay_map()?;
    // Resolve the broker before touching hardware so misconfiguration exits cleanly
    let session = MqttSession::from_config(&config.mqtt)?;

    let reason = if dry_run {
        warn!("Dry run: GPIO writes are only logged");
        run_with_gpio(&config, relays, session, SimulatedGpio::new()).await
    } else {
        let gpio = RppalGpio::new()?;
        run_with_gpio(&config, relays, session, gpio).await
    };

    if let ShutdownReason::Fatal(e) = reason {
        // Relays are already off; report and exit normally
        error!("Bridge stopped after an error: {}", e);
    }
    Ok(())
}

async fn run_with_gpio<G: Gpio>(
    config: &BridgeConfig,
    relays: RelayMap,
    session: MqttSession,
    gpio: G,
) -> ShutdownReason {
    let supervisor = ConnectionSupervisor::new(
        session,
        ReconnectPolicy::from_config(&config.mqtt),
        config.mqtt.topic.clone(),
    )
    .ignore_retained(config.mqtt.ignore_retained);

    let dispatcher = CommandDispatcher::new(OutputController::new(relays, gpio));

    BridgeLifecycle::new(supervisor, dispatcher)
        .run(wait_for_shutdown_signal())
        .await
}

fn handle_config_command(config: &BridgeConfig, show: bool) -> BridgeResult<()> {
    let relays = config.relays.relay_map()?;

    if show {
        println!("{}", config.to_toml_string()?);
    }

    match config.mqtt.resolve_endpoint() {
        Ok(endpoint) => info!(
            host = %endpoint.host,
            port = endpoint.port,
            tls = endpoint.tls,
            "Broker endpoint resolved"
        ),
        Err(e) => warn!("{}", e),
    }

    info!(
        relays = relays.len(),
        range = %relays.describe_range(),
        topic = %config.mqtt.topic,
        "Configuration validation complete"
    );
    Ok(())
}
