//! Durable transfer progress, one document per run.
//!
//! The checkpoint is persisted after every batch boundary with a
//! temp-file-plus-rename write, so an interrupted run loses at most the
//! tracks of one unflushed batch. A checkpoint only resumes a run when its
//! format version and source account match the current session; anything
//! else is discarded and the run starts fresh.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::SourcePlaylist;
use crate::error::{AppError, Result};

pub const CHECKPOINT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistStatus {
    Pending,
    InProgress,
    Completed,
}

/// Per-playlist progress. `tracks_processed` is a prefix cursor into the
/// source track sequence; resume re-enters at exactly this offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistCheckpoint {
    pub name: String,
    pub status: PlaylistStatus,
    pub destination_playlist_id: Option<String>,
    pub tracks_processed: usize,
    pub tracks_found: usize,
    pub tracks_not_found: usize,
}

impl PlaylistCheckpoint {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: PlaylistStatus::Pending,
            destination_playlist_id: None,
            tracks_processed: 0,
            tracks_found: 0,
            tracks_not_found: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_user_id: String,
    pub status: RunStatus,
    pub total_playlists: usize,
    pub playlists: BTreeMap<String, PlaylistCheckpoint>,
}

impl RunCheckpoint {
    pub fn new(source_user_id: &str, playlists: &[SourcePlaylist]) -> Self {
        let now = Utc::now();
        let entries = playlists
            .iter()
            .map(|p| (p.id.clone(), PlaylistCheckpoint::pending(&p.name)))
            .collect();

        Self {
            version: CHECKPOINT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            source_user_id: source_user_id.to_string(),
            status: RunStatus::InProgress,
            total_playlists: playlists.len(),
            playlists: entries,
        }
    }

    /// Entry for a playlist, created as pending if the playlist appeared
    /// after the checkpoint was initialized.
    pub fn entry_mut(&mut self, playlist_id: &str, name: &str) -> &mut PlaylistCheckpoint {
        self.playlists
            .entry(playlist_id.to_string())
            .or_insert_with(|| PlaylistCheckpoint::pending(name))
    }

    pub fn is_completed(&self, playlist_id: &str) -> bool {
        self.playlists
            .get(playlist_id)
            .map(|e| e.status == PlaylistStatus::Completed)
            .unwrap_or(false)
    }

    pub fn completed_count(&self) -> usize {
        self.playlists
            .values()
            .filter(|e| e.status == PlaylistStatus::Completed)
            .count()
    }
}

/// Read-only view of a checkpoint for the status command.
#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_user_id: String,
    pub status: RunStatus,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub tracks_found: usize,
    pub tracks_not_found: usize,
    /// Name and cursor of the playlist currently mid-transfer, if any.
    pub current: Option<(String, usize)>,
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Updated: {}", self.updated_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Spotify user: {}", self.source_user_id)?;
        writeln!(
            f,
            "Status: {}",
            match self.status {
                RunStatus::InProgress => "in progress",
                RunStatus::Completed => "completed",
            }
        )?;
        writeln!(f, "\nPlaylists: {} total", self.total)?;
        writeln!(f, "  Completed: {}", self.completed)?;
        writeln!(f, "  In progress: {}", self.in_progress)?;
        writeln!(f, "  Pending: {}", self.pending)?;
        writeln!(f, "\nTracks processed: {}", self.tracks_found + self.tracks_not_found)?;
        writeln!(f, "  Found: {}", self.tracks_found)?;
        write!(f, "  Not found: {}", self.tracks_not_found)?;
        if let Some((name, cursor)) = &self.current {
            write!(f, "\n\nCurrently in progress: {} (at track {})", name, cursor)?;
        }
        Ok(())
    }
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a checkpoint valid for resuming a run as `expected_user`.
    ///
    /// Corruption, a version mismatch, a completed prior run, or a
    /// checkpoint belonging to a different account all yield `None` (fresh
    /// run) rather than an error.
    pub fn load_for(&self, expected_user: &str) -> Option<RunCheckpoint> {
        let checkpoint = match self.load_raw() {
            Ok(Some(cp)) => cp,
            Ok(None) => return None,
            Err(e) => {
                warn!("Checkpoint file unreadable ({}), starting fresh", e);
                return None;
            }
        };

        if checkpoint.version != CHECKPOINT_VERSION {
            info!(
                "Checkpoint version mismatch ({} != {}), starting fresh",
                checkpoint.version, CHECKPOINT_VERSION
            );
            return None;
        }

        if checkpoint.status == RunStatus::Completed {
            info!("Previous transfer completed, starting fresh");
            return None;
        }

        if checkpoint.source_user_id != expected_user {
            warn!(
                "Checkpoint belongs to Spotify user {} but session is {}, starting fresh",
                checkpoint.source_user_id, expected_user
            );
            return None;
        }

        Some(checkpoint)
    }

    fn load_raw(&self) -> Result<Option<RunCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let checkpoint = serde_json::from_str(&contents)?;
        Ok(Some(checkpoint))
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Persist the checkpoint atomically, refreshing `updated_at`.
    pub fn save(&self, checkpoint: &mut RunCheckpoint) -> Result<()> {
        checkpoint.updated_at = Utc::now();

        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        let temp_path = dir.join(format!(".checkpoint.tmp-{}", std::process::id()));
        {
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, checkpoint)?;
            writer.flush()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Archive the live checkpoint after a fully completed run: copy it to a
    /// timestamped sibling, then remove the live file.
    pub fn archive(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("checkpoint");
        let archive_name = format!(
            "{}_completed_{}.json",
            stem,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let archive_path = self.parent_dir().join(archive_name);

        fs::copy(&self.path, &archive_path)?;
        fs::remove_file(&self.path)?;
        info!("Checkpoint archived to {}", archive_path.display());

        Ok(Some(archive_path))
    }

    /// Delete the live checkpoint. Returns whether a file was removed.
    pub fn reset(&self) -> Result<bool> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Read-only summary for the status command. Unlike `load_for`, a
    /// corrupt file is surfaced as an error here so the user sees it.
    pub fn read_summary(&self) -> Result<Option<CheckpointSummary>> {
        let Some(checkpoint) = self
            .load_raw()
            .map_err(|e| AppError::Checkpoint(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut summary = CheckpointSummary {
            created_at: checkpoint.created_at,
            updated_at: checkpoint.updated_at,
            source_user_id: checkpoint.source_user_id,
            status: checkpoint.status,
            total: checkpoint.playlists.len(),
            completed: 0,
            in_progress: 0,
            pending: 0,
            tracks_found: 0,
            tracks_not_found: 0,
            current: None,
        };

        for entry in checkpoint.playlists.values() {
            match entry.status {
                PlaylistStatus::Completed => summary.completed += 1,
                PlaylistStatus::InProgress => {
                    summary.in_progress += 1;
                    if summary.current.is_none() {
                        summary.current = Some((entry.name.clone(), entry.tracks_processed));
                    }
                }
                PlaylistStatus::Pending => summary.pending += 1,
            }
            summary.tracks_found += entry.tracks_found;
            summary.tracks_not_found += entry.tracks_not_found;
        }

        Ok(Some(summary))
    }
}
