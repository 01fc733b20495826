//! The transfer orchestrator.
//!
//! Playlists are processed strictly sequentially, tracks within a playlist
//! strictly sequentially: the destination endpoints are rate limited and the
//! playlist member set must reflect each write before the next track is
//! evaluated. Per playlist the checkpoint entry moves pending → in_progress
//! → completed; the checkpoint document is flushed at every batch boundary,
//! so a crash loses at most one unpersisted batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::{DestinationCatalog, SourceCatalog, SourcePlaylist};
use crate::config::SyncTuning;
use crate::error::Result;
use crate::library::{Availability, LibraryStore};
use crate::sync::checkpoint::{CheckpointStore, PlaylistStatus, RunCheckpoint, RunStatus};
use crate::sync::dedup::DuplicateDetector;
use crate::sync::limiter::RateLimiter;
use crate::sync::log::TransferLog;
use crate::sync::report::{PlaylistOutcome, PlaylistReport, RunSummary};
use crate::sync::resolver::TrackResolver;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore and replace any existing checkpoint.
    pub fresh_start: bool,
    /// Skip playlists that already meet the synced threshold, without any
    /// search calls.
    pub sync_only: bool,
}

pub struct TransferEngine<S, D> {
    source: S,
    dest: D,
    library: LibraryStore,
    checkpoints: CheckpointStore,
    dedup: DuplicateDetector,
    resolver: TrackResolver,
    log: Arc<dyn TransferLog>,
    tuning: SyncTuning,
    options: RunOptions,
}

impl<S: SourceCatalog, D: DestinationCatalog> TransferEngine<S, D> {
    pub fn new(
        source: S,
        dest: D,
        library: LibraryStore,
        checkpoints: CheckpointStore,
        log: Arc<dyn TransferLog>,
        tuning: SyncTuning,
        options: RunOptions,
    ) -> Self {
        let resolver = TrackResolver::new(RateLimiter::new(tuning.search_throttle));
        Self {
            source,
            dest,
            library,
            checkpoints,
            dedup: DuplicateDetector::new(),
            resolver,
            log,
            tuning,
            options,
        }
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();

        // Auth problems surface here, before any checkpoint is touched.
        let user_id = self.source.current_user_id().await?;

        self.dedup = DuplicateDetector::build(&self.dest).await;
        self.log
            .record(&format!("Cached {} Tidal playlists", self.dedup.len()));

        let mut prior = if self.options.fresh_start {
            info!("Fresh start requested, ignoring any existing checkpoint");
            None
        } else {
            self.checkpoints.load_for(&user_id)
        };
        if let Some(cp) = &prior {
            let line = format!(
                "Resuming from checkpoint: {}/{} playlists completed",
                cp.completed_count(),
                cp.total_playlists
            );
            info!("{}", line);
            self.log.record(&line);
        }

        let playlists = self.source.list_owned_playlists().await?;
        if playlists.is_empty() {
            info!("No playlists to transfer");
            return Ok(summary);
        }

        let mut checkpoint = match prior.take() {
            Some(cp) => cp,
            None => {
                let mut cp = RunCheckpoint::new(&user_id, &playlists);
                self.checkpoints.save(&mut cp)?;
                cp
            }
        };

        let pb = ProgressBar::new(playlists.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for playlist in &playlists {
            pb.set_message(format!("Syncing: {}", playlist.name));

            // Completed in a prior run: no network calls at all.
            if checkpoint.is_completed(&playlist.id) {
                self.log
                    .record(&format!("Skipping already completed: {}", playlist.name));
                summary.push(PlaylistReport {
                    name: playlist.name.clone(),
                    outcome: PlaylistOutcome::PreviouslyCompleted,
                });
                pb.inc(1);
                continue;
            }

            if self.options.sync_only
                && self
                    .dedup
                    .decide_synced(
                        &self.dest,
                        &playlist.name,
                        playlist.track_count,
                        self.tuning.synced_threshold,
                    )
                    .await
            {
                self.log.record(&format!(
                    "Already synced: {} ({} tracks on Spotify)",
                    playlist.name, playlist.track_count
                ));
                let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
                entry.status = PlaylistStatus::Completed;
                self.persist(&mut checkpoint);
                summary.push(PlaylistReport {
                    name: playlist.name.clone(),
                    outcome: PlaylistOutcome::AlreadySynced,
                });
                pb.inc(1);
                continue;
            }

            let outcome = self.transfer_playlist(&mut checkpoint, playlist).await;
            summary.push(PlaylistReport {
                name: playlist.name.clone(),
                outcome,
            });
            pb.inc(1);

            if !self.tuning.playlist_pause.is_zero() {
                sleep(self.tuning.playlist_pause).await;
            }
        }
        pb.finish_with_message("Transfer complete");

        let fully_complete = checkpoint
            .playlists
            .values()
            .all(|e| e.status == PlaylistStatus::Completed);
        if fully_complete {
            checkpoint.status = RunStatus::Completed;
            self.persist(&mut checkpoint);
            match self.checkpoints.archive() {
                Ok(Some(path)) => self
                    .log
                    .record(&format!("Checkpoint archived to {}", path.display())),
                Ok(None) => {}
                Err(e) => warn!("Failed to archive checkpoint: {}", e),
            }
        } else {
            self.persist(&mut checkpoint);
            info!("Some playlists incomplete; checkpoint kept for the next run");
        }

        self.log.record(&format!(
            "Totals: {} found, {} not found",
            summary.tracks_found, summary.tracks_not_found
        ));

        Ok(summary)
    }

    async fn transfer_playlist(
        &mut self,
        checkpoint: &mut RunCheckpoint,
        playlist: &SourcePlaylist,
    ) -> PlaylistOutcome {
        self.log.record(&format!(
            "Processing: {} ({} tracks)",
            playlist.name, playlist.track_count
        ));

        if playlist.track_count == 0 {
            self.log.record("Skipping empty playlist");
            let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
            entry.status = PlaylistStatus::Completed;
            self.persist(checkpoint);
            return PlaylistOutcome::SkippedEmpty;
        }

        let tracks = match self.source.list_tracks(&playlist.id).await {
            Ok(tracks) if !tracks.is_empty() => tracks,
            Ok(_) => {
                warn!("No tracks retrieved for {}", playlist.name);
                return PlaylistOutcome::Error {
                    reason: "no tracks retrieved".into(),
                };
            }
            Err(e) => {
                warn!("Failed to fetch tracks for {}: {}", playlist.name, e);
                return PlaylistOutcome::Error {
                    reason: e.to_string(),
                };
            }
        };

        // Bind the destination playlist before any track work so a crash
        // mid-transfer never loses the binding: checkpoint binding first,
        // then a same-named existing playlist, then create.
        let bound = checkpoint
            .entry_mut(&playlist.id, &playlist.name)
            .destination_playlist_id
            .clone();
        let known = bound.or_else(|| self.dedup.find_existing(&playlist.name).map(str::to_string));

        let (dest_id, mut members) = match known {
            Some(id) => {
                let members = self.dedup.fetch_members(&self.dest, &id).await;
                self.log.record(&format!(
                    "Found existing Tidal playlist: {} ({} tracks)",
                    playlist.name,
                    members.len()
                ));
                (id, members)
            }
            None => {
                let description = format!(
                    "Transferred from Spotify - {} tracks - {}",
                    tracks.len(),
                    Utc::now().format("%Y-%m-%d")
                );
                match self.dest.create_playlist(&playlist.name, &description).await {
                    Ok(id) => {
                        self.dedup.note_created(&playlist.name, &id);
                        self.log
                            .record(&format!("Created Tidal playlist: {} ({})", playlist.name, id));
                        (id, HashSet::new())
                    }
                    Err(e) => {
                        warn!("Failed to create Tidal playlist {}: {}", playlist.name, e);
                        return PlaylistOutcome::Error {
                            reason: format!("playlist creation failed: {}", e),
                        };
                    }
                }
            }
        };

        {
            let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
            entry.destination_playlist_id = Some(dest_id.clone());
            entry.status = PlaylistStatus::InProgress;
        }
        self.persist(checkpoint);

        let start_index = {
            let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
            entry.tracks_processed.min(tracks.len())
        };
        let (mut found, mut not_found) = {
            let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
            (entry.tracks_found, entry.tracks_not_found)
        };
        let mut skipped = 0usize;
        let mut queue: Vec<String> = Vec::new();

        if start_index > 0 {
            self.log.record(&format!(
                "Resuming at track {}/{}",
                start_index + 1,
                tracks.len()
            ));
        }

        let pb = ProgressBar::new((tracks.len() - start_index) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for (idx, track) in tracks.iter().enumerate().skip(start_index) {
            let artist = track.primary_artist().to_string();

            if let Err(e) =
                self.library
                    .upsert(&track.id, &track.name, &artist, &track.album, Some(&playlist.id))
            {
                warn!("Failed to persist library record for {}: {}", track.id, e);
            }

            // Answer from the library when the track was resolved in a
            // previous run; only unknown (or repair-case) records cost a
            // search call and its throttle.
            let cached = self
                .library
                .get(&track.id)
                .map(|r| (r.destination_availability, r.destination_id.clone()));
            let needs_search = match &cached {
                Some((Availability::Available, Some(_))) => false,
                Some((Availability::Unavailable, _)) => false,
                _ => true,
            };

            let resolved = if needs_search {
                let resolved = self.resolver.resolve(&self.dest, &track.name, &artist).await;
                if let Err(e) =
                    self.library
                        .record_resolution(&track.id, resolved.as_deref(), resolved.is_some())
                {
                    warn!("Failed to persist resolution for {}: {}", track.id, e);
                }
                resolved
            } else if let Some((Availability::Available, id)) = cached {
                id
            } else {
                None
            };

            match resolved {
                Some(id) if members.contains(&id) => {
                    skipped += 1;
                    self.log
                        .record(&format!("  Already in playlist: {} - {}", artist, track.name));
                }
                Some(id) => {
                    // Optimistic insert: a later source track resolving to
                    // the same destination id is skipped, not double-queued.
                    members.insert(id.clone());
                    queue.push(id);
                    found += 1;
                }
                None => {
                    not_found += 1;
                    self.log
                        .record(&format!("  Not found: {} - {}", artist, track.name));
                }
            }

            if queue.len() >= self.tuning.batch_size {
                if !self.write_batch(&dest_id, &queue).await {
                    pb.finish_and_clear();
                    self.log.record(&format!(
                        "Batch write failed twice, leaving {} in progress",
                        playlist.name
                    ));
                    return PlaylistOutcome::Error {
                        reason: "batch write failed".into(),
                    };
                }
                let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
                entry.tracks_processed = idx + 1;
                entry.tracks_found = found;
                entry.tracks_not_found = not_found;
                self.persist(checkpoint);
                queue.clear();
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if !queue.is_empty() && !self.write_batch(&dest_id, &queue).await {
            self.log.record(&format!(
                "Final batch write failed twice, leaving {} in progress",
                playlist.name
            ));
            return PlaylistOutcome::Error {
                reason: "batch write failed".into(),
            };
        }

        {
            let entry = checkpoint.entry_mut(&playlist.id, &playlist.name);
            entry.status = PlaylistStatus::Completed;
            entry.tracks_processed = tracks.len();
            entry.tracks_found = found;
            entry.tracks_not_found = not_found;
        }
        self.persist(checkpoint);

        let match_rate = found as f64 / tracks.len() as f64 * 100.0;
        self.log.record(&format!(
            "Completed: {} - {}/{} found ({:.1}%), {} not found, {} already present",
            playlist.name,
            found,
            tracks.len(),
            match_rate,
            not_found,
            skipped
        ));

        PlaylistOutcome::Completed {
            total: tracks.len(),
            found,
            not_found,
            skipped,
        }
    }

    /// One write attempt plus one retry after a fixed backoff. A false
    /// return means the caller must not advance the cursor.
    async fn write_batch(&self, playlist_id: &str, track_ids: &[String]) -> bool {
        match self.dest.add_tracks(playlist_id, track_ids).await {
            Ok(()) => {
                if !self.tuning.batch_pause.is_zero() {
                    sleep(self.tuning.batch_pause).await;
                }
                true
            }
            Err(e) => {
                warn!("Batch add failed, retrying after backoff: {}", e);
                if !self.tuning.batch_retry_backoff.is_zero() {
                    sleep(self.tuning.batch_retry_backoff).await;
                }
                match self.dest.add_tracks(playlist_id, track_ids).await {
                    Ok(()) => {
                        if !self.tuning.batch_pause.is_zero() {
                            sleep(self.tuning.batch_pause).await;
                        }
                        true
                    }
                    Err(e) => {
                        warn!("Batch add retry failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Checkpoint saves must never abort a run mid-playlist; a failed save
    /// costs at most one batch of redone work on the next run.
    fn persist(&self, checkpoint: &mut RunCheckpoint) {
        if let Err(e) = self.checkpoints.save(checkpoint) {
            warn!("Failed to save checkpoint: {}", e);
        }
    }
}
