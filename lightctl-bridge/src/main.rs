//! lightctl-bridge: serial light controller bridge.
//!
//! Keeps an authoritative table of the controller's channel states, fed by
//! the status reports the controller prints on its serial port, and exposes
//! every configured channel as a switchable accessory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use lightctl_bridge::accessory::AccessoryRegistry;
use lightctl_bridge::config::{load_config, ConfigFile, DEFAULT_CONFIG_FILE};
use lightctl_bridge::dispatch::CommandDispatcher;
use lightctl_bridge::driver::ReconciliationDriver;
use lightctl_bridge::state::ChannelStateTable;
use lightctl_bridge::transport::{open_serial, spawn_link, LinkHandle};
use lightctl_bridge::{logging, web};

/// lightctl-bridge - Serial light controller bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Serial device of the controller
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Address for the accessory API to listen on
    #[arg(long)]
    web_listen: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value = "7")]
    log_retention_days: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Config file: explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    });
    let file_config = match &config_path {
        Some(path) => match load_config(path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence over the config file
    let log_dir = if args.log_dir.to_string_lossy() != "logs" {
        args.log_dir.clone()
    } else {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    };
    let log_retention_days = if args.log_retention_days != 7 {
        args.log_retention_days
    } else {
        file_config.logging.retention_days.unwrap_or(7)
    };
    logging::init_logging(
        &log_dir,
        log_retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    info!(
        "Finished initializing platform: {}",
        file_config.display_name().unwrap_or("lightctl")
    );

    let mut serial = file_config.serial_settings();
    if let Some(port) = args.port {
        serial.path = port;
    }
    if let Some(baud_rate) = args.baud_rate {
        serial.baud_rate = baud_rate;
    }
    info!("  Serial port: {} @ {} baud", serial.path, serial.baud_rate);
    info!("  Dispatch policy: {:?}", file_config.dispatch);

    let table = Arc::new(ChannelStateTable::new());

    // No retry: with the port down the bridge still serves accessories and
    // every write fails (and is logged) until restart.
    let (link, events) = match open_serial(&serial) {
        Ok(stream) => {
            let (link, events) = spawn_link(stream, serial.delimiter);
            (link, Some(events))
        }
        Err(e) => {
            error!("Serial port error: {}", e);
            (LinkHandle::disconnected(), None)
        }
    };

    let dispatcher = CommandDispatcher::new(link, Arc::clone(&table), file_config.dispatch);
    let registry = Arc::new(AccessoryRegistry::new(Arc::clone(&table), dispatcher));

    if let Some(events) = events {
        let driver = ReconciliationDriver::new(Arc::clone(&table), Arc::clone(&registry));
        tokio::spawn(driver.run(events));
    }

    let devices = file_config.devices();
    info!("Configured accessories: {}", devices.len());
    let report = registry.discover(&devices);
    info!(
        "Discovery finished: {} created, {} updated, {} rejected",
        report.created.len(),
        report.updated.len(),
        report.rejected.len()
    );

    let web_listen = match args.web_listen {
        Some(addr) => Some(addr),
        None => match file_config.web.listen.as_deref().map(str::parse::<SocketAddr>) {
            Some(Ok(addr)) => Some(addr),
            Some(Err(e)) => {
                warn!("Ignoring invalid web.listen address: {}", e);
                None
            }
            None => None,
        },
    };
    if let Some(addr) = web_listen {
        let web_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            match web::start_web_server(addr, web_registry).await {
                Ok(_) => info!("Accessory API stopped"),
                Err(e) => error!("Accessory API error: {}", e),
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
