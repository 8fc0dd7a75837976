//! xplrcs - xPL bridge for RCS serial thermostats
//!
//! Polls RCS thermostats on an RS-232/RS-485 link, broadcasts their state
//! changes as `hvac.*` xPL messages and carries `hvac.basic`/`hvac.request`
//! commands back to the thermostats.
//!
//! # Usage
//!
//! ```bash
//! # Zones and serial settings from the config file
//! xplrcs --config /etc/xplrcs.json
//!
//! # Override port and instance, verbose logging
//! xplrcs -c xplrcs.json -p /dev/ttyUSB0 -n upstairs --log-level debug
//! ```

mod xpl;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xplrcs_core::bridge::Bridge;
use xplrcs_core::config::BridgeConfig;
use xplrcs_core::protocol::SerialOpener;

use crate::xpl::{XplEndpoint, HEARTBEAT_MINUTES};

/// Engine tick
const TICK: Duration = Duration::from_secs(1);

/// How often the serial port is checked for data
const SERIAL_POLL: Duration = Duration::from_millis(20);

/// xPL bridge for RCS serial thermostats
#[derive(Parser, Debug)]
#[command(name = "xplrcs")]
#[command(about = "xPL bridge for RCS RS-232/RS-485 thermostats")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = "/etc/xplrcs.json")]
    config: PathBuf,

    /// Serial port (overrides the config file)
    #[arg(short = 'p', long)]
    com_port: Option<String>,

    /// xPL instance id (overrides the config file)
    #[arg(short = 'n', long)]
    instance: Option<String>,

    /// IPv4 address of the interface to broadcast on
    #[arg(short, long)]
    interface: Option<Ipv4Addr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(&args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(run(config, args.interface))
}

fn load_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = BridgeConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    if let Some(port) = &args.com_port {
        config.com_port = port.clone();
    }
    if let Some(instance) = &args.instance {
        config.instance = instance.clone();
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    Ok(config)
}

async fn run(config: BridgeConfig, interface: Option<Ipv4Addr>) -> Result<()> {
    let endpoint =
        XplEndpoint::bind(&config.instance, interface).context("Failed to open xPL socket")?;

    info!("xplrcs v{}", env!("CARGO_PKG_VERSION"));
    info!("xPL source: {}", endpoint.source());
    info!("Serial port: {} at {} baud", config.com_port, config.baud_rate);
    info!("Zones: {}", config.zones.len());

    let com_port = config.com_port.clone();
    let mut bridge = Bridge::connect(config, SerialOpener, endpoint.bus())
        .with_context(|| format!("Failed to open serial port {}", com_port))?;

    let mut tick = interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut serial = interval(SERIAL_POLL);
    serial.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut heartbeat = interval(Duration::from_secs(HEARTBEAT_MINUTES * 60));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut buf = vec![0u8; 1500];
    loop {
        tokio::select! {
            _ = tick.tick() => bridge.on_tick(),
            _ = serial.tick() => bridge.on_serial_readable(),
            _ = heartbeat.tick() => {
                if let Err(e) = endpoint.heartbeat() {
                    warn!(error = %e, "Heartbeat failed");
                }
            }
            res = endpoint.recv_command(&mut buf) => match res {
                Ok(msg) => bridge.on_inbound_message(&msg),
                Err(e) => warn!(error = %e, "xPL receive failed"),
            },
            res = &mut shutdown => {
                res?;
                break;
            }
        }
    }

    info!("Shutting down");
    if let Err(e) = endpoint.goodbye() {
        warn!(error = %e, "Failed to send hbeat.end");
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to wait for Ctrl-C")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "xplrcs",
            "--config",
            "/tmp/x.json",
            "-p",
            "/dev/ttyUSB1",
            "-n",
            "upstairs",
            "-i",
            "192.168.1.10",
        ]);
        assert_eq!(args.config, PathBuf::from("/tmp/x.json"));
        assert_eq!(args.com_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(args.instance.as_deref(), Some("upstairs"));
        assert_eq!(args.interface, Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::parse_from(["xplrcs", "--config", "/nonexistent/xplrcs.json"]);
        assert!(load_config(&args).is_err());
    }
}
