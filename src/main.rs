//! GaitVision agent CLI
//!
//! Plantar-pressure acquisition and therapy session tracking.

use clap::{Parser, Subcommand};
use gaitvision_agent::{
    collector::{
        create_shared_slot, create_shared_stats, PressureSampler, SerialBridge, SerialConnector,
    },
    config::Config,
    VERSION,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gaitvision=info,gaitvision_agent=info,tower_http=info";

#[derive(Parser)]
#[command(name = "gaitvision")]
#[command(version = VERSION)]
#[command(about = "Plantar-pressure acquisition and session tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the serial bridge and the HTTP API
    Serve {
        /// Address to bind the HTTP server to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind the HTTP server to
        #[arg(long)]
        port: Option<u16>,

        /// Serial device of the insole (overrides ARDUINO_PORT)
        #[arg(long)]
        serial_port: Option<String>,

        /// Serial line speed
        #[arg(long)]
        baud_rate: Option<u32>,

        /// Store connection string (overrides DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Do not open the serial port; /pressure serves simulated data
        #[arg(long)]
        no_serial: bool,
    },

    /// Read one frame from the insole and print it
    Read {
        /// Serial device of the insole (overrides ARDUINO_PORT)
        #[arg(long)]
        serial_port: Option<String>,

        /// Seconds to wait for a frame, including the board reset
        #[arg(long, default_value = "3")]
        timeout: f64,

        /// Report no data instead of a simulated frame
        #[arg(long)]
        no_fallback: bool,
    },

    /// Show configuration
    Config,
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            serial_port,
            baud_rate,
            database_url,
            no_serial,
        } => {
            let mut config = load_config();
            config.apply_overrides(serial_port, database_url);
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(baud_rate) = baud_rate {
                config.baud_rate = baud_rate;
            }
            cmd_serve(config, no_serial);
        }
        Commands::Read {
            serial_port,
            timeout,
            no_fallback,
        } => {
            let mut config = load_config();
            config.apply_overrides(serial_port, None);
            cmd_read(&config, timeout, !no_fallback);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Saved configuration with environment overrides applied.
fn load_config() -> Config {
    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    };
    config.apply_env();
    config
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config, no_serial: bool) {
    use gaitvision_agent::core::SessionAggregator;
    use gaitvision_agent::server::{self, ServerConfig, ServerState};
    use gaitvision_agent::store::Database;

    println!("GaitVision Agent v{VERSION}");
    println!();

    let database_url = match config.database_url() {
        Ok(url) => url.to_string(),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let database = match Database::connect(&database_url) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening database: {e}");
            std::process::exit(1);
        }
    };

    let slot = create_shared_slot();
    let stats = create_shared_stats();
    let mut bridge = SerialBridge::new(slot.clone(), stats.clone(), config.reconnect_backoff);

    if no_serial {
        println!("  Serial: disabled");
    } else {
        let settings = config.serial_settings();
        println!("  Serial: {} @ {} baud", settings.port, settings.baud_rate);
        if let Err(e) = bridge.start(SerialConnector::new(settings)) {
            eprintln!("Error starting serial bridge: {e}");
            std::process::exit(1);
        }
    }
    println!("  Database: {database_url}");
    println!(
        "  Simulated fallback: {}",
        if config.allow_simulated {
            "enabled"
        } else {
            "disabled"
        }
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error creating async runtime: {e}");
            std::process::exit(1);
        }
    };

    let server_config = ServerConfig::from_config(&config);
    let state = ServerState::new(
        &server_config,
        SessionAggregator::new(database),
        PressureSampler::new(slot, stats.clone()),
    );

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let (addr, shutdown_tx) = server::run(server_config, state).await?;

        println!();
        println!("Listening on http://{addr}");
        println!("Press Ctrl+C to stop");
        println!();

        tokio::signal::ctrl_c().await?;
        println!();
        println!("Stopping...");
        let _ = shutdown_tx.send(());
        Ok(())
    });

    bridge.stop();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    println!("{}", stats.summary());
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_config: Config, _no_serial: bool) {
    eprintln!("Error: this build does not include the HTTP server (enable the `server` feature)");
    std::process::exit(1);
}

fn cmd_read(config: &Config, timeout_secs: f64, allow_fallback: bool) {
    let timeout = match Duration::try_from_secs_f64(timeout_secs) {
        Ok(timeout) => timeout,
        Err(_) => {
            eprintln!("Error: --timeout must be a non-negative number of seconds");
            std::process::exit(1);
        }
    };

    let slot = create_shared_slot();
    let stats = create_shared_stats();
    let mut bridge = SerialBridge::new(slot.clone(), stats.clone(), config.reconnect_backoff);

    if let Err(e) = bridge.start(SerialConnector::new(config.serial_settings())) {
        eprintln!("Error starting serial bridge: {e}");
        std::process::exit(1);
    }

    let sampler = PressureSampler::new(slot, stats);
    let reading = sampler.read(timeout, allow_fallback);
    bridge.stop();

    let output = serde_json::json!({
        "pressure": reading.frame(),
        "source": reading.source(),
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding frame: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config() {
    let config = load_config();

    println!("GaitVision Agent Configuration");
    println!("==============================");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();

    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error encoding configuration: {e}"),
    }
}
