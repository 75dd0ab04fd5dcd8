//! # Telemetry Logger
//!
//! Appends one JSON object per poll cycle to JSONL files, rotating after a
//! fixed number of records and keeping only the newest files.
//!
//! Files are named `telemetry_<seq>_<utc time>.jsonl`. The sequence number
//! resumes from the files already on disk and decides which file is oldest,
//! so a clock that steps backwards cannot reorder them.

use crate::config::TelemetryConfig;
use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// Rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    current: Option<PathBuf>,
    next_sequence: u64,
}

impl TelemetryLogger {
    /// Create a logger writing into `config.log_dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        fs::create_dir_all(&config.log_dir)?;

        let mut logger = Self {
            dir: PathBuf::from(&config.log_dir),
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            records_in_file: 0,
            current: None,
            next_sequence: 0,
        };
        logger.next_sequence = logger
            .log_files()?
            .iter()
            .filter_map(|path| sequence_of(path))
            .max()
            .map_or(0, |last| last + 1);

        info!(
            "Logging telemetry to {} (next file #{})",
            config.log_dir, logger.next_sequence
        );
        Ok(logger)
    }

    /// Append one record as a JSON line
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails
    pub fn log<T: Serialize>(&mut self, record: &T) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Directory the log files are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{:06}_{}.{}",
            FILE_PREFIX,
            self.next_sequence,
            Utc::now().format("%Y%m%d_%H%M%S"),
            FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened telemetry log {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.current = Some(path);
        self.next_sequence += 1;

        self.prune()
    }

    /// Delete the oldest log files beyond `max_files_to_keep`
    ///
    /// The file being written is never deleted.
    fn prune(&self) -> Result<()> {
        let files: Vec<PathBuf> = self
            .log_files()?
            .into_iter()
            .filter(|path| Some(path) != self.current.as_ref())
            .collect();
        let keep_old = self.max_files_to_keep.saturating_sub(1);
        if files.len() <= keep_old {
            return Ok(());
        }

        let excess = files.len() - keep_old;
        for path in files.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old telemetry log {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Path of the file currently written to
    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Telemetry log files currently in the directory, oldest first
    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_EXTENSION));
            if is_log {
                files.push(path);
            }
        }
        files.sort_by(|a, b| {
            let key_a = (sequence_of(a).unwrap_or(0), a);
            let key_b = (sequence_of(b).unwrap_or(0), b);
            key_a.cmp(&key_b)
        });
        Ok(files)
    }
}

/// Sequence number leading a log file name
fn sequence_of(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}
