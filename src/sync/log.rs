//! Durable per-track outcome log.
//!
//! Injected into the engine as a capability so tests can capture output
//! without filesystem side effects.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::error::Result;

pub trait TransferLog: Send + Sync {
    /// Append one line to the run log. Must never fail the caller.
    fn record(&self, message: &str);
}

/// Append-only timestamped log file, one per run.
pub struct FileTransferLog {
    path: PathBuf,
}

impl FileTransferLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a log named after the current time, the way each run gets its
    /// own `transfer_log_*.txt`.
    pub fn for_current_run(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!("transfer_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        Ok(Self::new(dir.join(name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransferLog for FileTransferLog {
    fn record(&self, message: &str) {
        let line = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!("Failed to write transfer log {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
pub struct MemoryLog(pub std::sync::Mutex<Vec<String>>);

#[cfg(test)]
impl MemoryLog {
    pub fn new() -> Self {
        Self(std::sync::Mutex::new(Vec::new()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TransferLog for MemoryLog {
    fn record(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}
