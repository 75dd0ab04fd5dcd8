//! # Solar Bridge
//!
//! Monitor a Victron MPPT charge controller over VE.Direct and switch
//! off-grid loads through a relay board.
//!
//! Relay commands are read from stdin, one per line:
//!
//! ```text
//! on fridge
//! off fan
//! ```

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use solar_bridge::config::{Config, LoggingConfig};
use solar_bridge::poller::{PollingDriver, SnapshotReceiver};
use solar_bridge::relay::board::{RelayBoard, RelayCommand};
use solar_bridge::telemetry::logger::TelemetryLogger;
use solar_bridge::telemetry::snapshot::TelemetrySnapshot;
use solar_bridge::telemetry::store::TelemetryStore;

/// Configuration used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Relay commands buffered between polls
const COMMAND_QUEUE_SIZE: usize = 16;

/// File name prefix of the rolling application log
const LOG_FILE_NAME: &str = "solar-bridge.log";

/// Main entry point for Solar Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging
///    - Open the VE.Direct link, falling back to simulation
///    - Configure relays and the telemetry log
///
/// 2. **Main Loop**
///    - Poll the charger every `polling.interval_ms`
///    - Apply relay commands from stdin between polls
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops polling and switches every load off
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The relay GPIO lines cannot be configured
/// - The telemetry log directory cannot be created
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Solar Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let store = TelemetryStore::open(&config.serial);
    if store.simulation() {
        warn!("Running in simulation mode, telemetry values are synthetic");
    }

    let board = RelayBoard::from_config(&config.relays, &config.loads)
        .context("Failed to set up relay board")?;

    let logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry).context("Failed to set up telemetry log")?)
    } else {
        None
    };

    let (driver, snapshots) = PollingDriver::new(
        store,
        board,
        logger,
        Duration::from_millis(config.polling.interval_ms),
    );

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
    tokio::spawn(read_commands(commands_tx));
    tokio::spawn(report_snapshots(snapshots));

    info!("Press Ctrl+C to exit");
    driver.run(commands_rx).await?;

    Ok(())
}

/// Stdout logging, plus a daily rolling file when `file_dir` is set
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes
/// the file writer when dropped.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.file_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.file_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Forward relay commands typed on stdin to the driver
async fn read_commands(commands: mpsc::Sender<RelayCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match line.parse::<RelayCommand>() {
                Ok(command) => {
                    if commands.send(command).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("{}", e),
            },
            Ok(None) => {
                debug!("stdin closed, relay commands disabled");
                break;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    // Dropping the sender would stop the driver
    commands.closed().await;
}

/// Log a one-line summary of every published snapshot
async fn report_snapshots(mut snapshots: SnapshotReceiver) {
    while snapshots.changed().await.is_ok() {
        let line = snapshots.borrow_and_update().as_ref().map(summarize);
        if let Some(line) = line {
            info!("{}", line);
        }
    }
}

fn summarize(snapshot: &TelemetrySnapshot) -> String {
    fn show(value: Option<f64>, unit: &str) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{:.2} {}", v, unit))
    }

    let relays: Vec<String> = snapshot
        .relays
        .iter()
        .map(|r| format!("{}={}", r.name, if r.on { "on" } else { "off" }))
        .collect();

    format!(
        "{}battery {} {} ({}), panel {}, state {}, relays [{}]",
        if snapshot.available { "" } else { "[stale] " },
        show(snapshot.battery.voltage_v, "V"),
        show(snapshot.battery.current_a, "A"),
        snapshot
            .battery
            .charge_percent
            .map_or_else(|| "-".to_string(), |p| format!("{:.1}%", p)),
        show(snapshot.panel.power_w, "W"),
        snapshot.charger.state_of_operation.as_deref().unwrap_or("-"),
        relays.join(" ")
    )
}
