//! # Polling Driver
//!
//! Single owner of the telemetry store, the relay board and the telemetry
//! log. Every poll and every relay command runs on the same task, so bus
//! access never overlaps.
//!
//! ## Cycle
//!
//! 1. `store.update()`
//! 2. Build a [`TelemetrySnapshot`] with the current relay states
//! 3. Publish it on the watch channel
//! 4. Append it to the JSONL log
//!
//! A failed update republishes the last snapshot with `available = false`.
//! The next tick tries again.

use crate::error::{Result, SolarBridgeError};
use crate::relay::board::{RelayBoard, RelayCommand};
use crate::telemetry::logger::TelemetryLogger;
use crate::telemetry::snapshot::TelemetrySnapshot;
use crate::telemetry::store::TelemetryStore;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Number of cycles between status log messages
const LOG_INTERVAL_CYCLES: u64 = 30;

/// Receiving side of the snapshot channel
pub type SnapshotReceiver = watch::Receiver<Option<TelemetrySnapshot>>;

/// Periodic poll loop
#[derive(Debug)]
pub struct PollingDriver {
    store: TelemetryStore,
    board: RelayBoard,
    logger: Option<TelemetryLogger>,
    period: Duration,
    snapshots: watch::Sender<Option<TelemetrySnapshot>>,
    available: bool,
    cycles: u64,
    failures: u64,
}

impl PollingDriver {
    /// Create a driver and the receiver its snapshots are published on
    ///
    /// The receiver holds `None` until the first poll completes.
    pub fn new(
        store: TelemetryStore,
        board: RelayBoard,
        logger: Option<TelemetryLogger>,
        period: Duration,
    ) -> (Self, SnapshotReceiver) {
        let (snapshots, receiver) = watch::channel(None);
        let driver = Self {
            store,
            board,
            logger,
            period,
            snapshots,
            available: false,
            cycles: 0,
            failures: 0,
        };
        (driver, receiver)
    }

    /// Another receiver for the snapshot channel
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshots.subscribe()
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn board(&self) -> &RelayBoard {
        &self.board
    }

    /// Run one poll cycle and return what was published
    pub async fn poll_once(&mut self) -> TelemetrySnapshot {
        self.cycles += 1;

        let snapshot = match self.store.update().await {
            Ok(report) => {
                if report.warnings() > 0 {
                    debug!("{} records skipped in cycle {}", report.warnings(), self.cycles);
                }
                self.available = true;
                TelemetrySnapshot::capture(&self.store, &self.board.states(), true)
            }
            Err(e) => {
                let e = SolarBridgeError::UpdateFailed(e.to_string());
                warn!("{}", e);
                self.available = false;
                self.failures += 1;

                let previous = self.snapshots.borrow().clone();
                match previous {
                    Some(previous) => previous.mark_unavailable(),
                    None => TelemetrySnapshot::capture(&self.store, &self.board.states(), false),
                }
            }
        };

        self.publish(snapshot.clone());
        self.record(&snapshot);

        if self.cycles % LOG_INTERVAL_CYCLES == 0 {
            info!(
                "Completed {} poll cycles ({} failed{})",
                self.cycles,
                self.failures,
                if self.store.simulation() { ", simulation" } else { "" }
            );
        }

        snapshot
    }

    /// Switch a load and republish the relay states
    ///
    /// # Errors
    ///
    /// Returns error if the load is unknown or the relay cannot be driven
    pub fn handle_command(&mut self, command: &RelayCommand) -> Result<()> {
        self.board.switch(&command.load, command.on)?;
        let snapshot = TelemetrySnapshot::capture(&self.store, &self.board.states(), self.available);
        self.publish(snapshot);
        Ok(())
    }

    /// Poll until Ctrl+C or until every command sender is dropped
    ///
    /// All loads are switched off before returning.
    ///
    /// # Errors
    ///
    /// Returns error if the relays cannot be switched off
    pub async fn run(mut self, mut commands: mpsc::Receiver<RelayCommand>) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Polling every {} ms", self.period.as_millis());

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }

                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.handle_command(&command) {
                            warn!("Command {:?} rejected: {}", command, e);
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down...");
                        break;
                    }
                },

                _ = &mut shutdown => {
                    info!("Received Ctrl+C, shutting down...");
                    break;
                }
            }
        }

        self.board.all_off()?;
        let snapshot = TelemetrySnapshot::capture(&self.store, &self.board.states(), self.available);
        self.publish(snapshot);
        info!("Total poll cycles: {} ({} failed)", self.cycles, self.failures);
        Ok(())
    }

    fn publish(&self, snapshot: TelemetrySnapshot) {
        // send_replace keeps the value even when nobody is subscribed
        self.snapshots.send_replace(Some(snapshot));
    }

    fn record(&mut self, snapshot: &TelemetrySnapshot) {
        if let Some(logger) = self.logger.as_mut() {
            if let Err(e) = logger.log(snapshot) {
                warn!("Failed to write telemetry log: {}", e);
            }
        }
    }
}
