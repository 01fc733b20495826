//! Durable cross-platform track library.
//!
//! A record-oriented file (one JSON record per line, keyed by source track
//! id) that is fully loaded into memory on startup and rewritten atomically
//! after every mutation, so a crash mid-write never leaves a truncated store.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::library::record::{Availability, TrackRecord};

/// Availability counts for the library or one playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub available: usize,
    pub unavailable: usize,
    pub unknown: usize,
}

impl SyncStats {
    pub fn total(&self) -> usize {
        self.available + self.unavailable + self.unknown
    }

    /// Percentage of searched tracks that were found, 0.0 when nothing has
    /// been searched yet.
    pub fn match_rate(&self) -> f64 {
        let searched = self.available + self.unavailable;
        if searched == 0 {
            0.0
        } else {
            self.available as f64 / searched as f64 * 100.0
        }
    }
}

pub struct LibraryStore {
    path: PathBuf,
    tracks: BTreeMap<String, TrackRecord>,
}

impl LibraryStore {
    /// Open the library at `path`, loading any existing records. Malformed
    /// lines are dropped with a warning rather than failing the load.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut tracks = BTreeMap::new();

        if path.exists() {
            let file = fs::File::open(&path)?;
            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TrackRecord>(&line) {
                    Ok(record) => {
                        tracks.insert(record.source_id.clone(), record);
                    }
                    Err(e) => {
                        warn!("Skipping malformed library record at line {}: {}", line_no + 1, e);
                    }
                }
            }
            info!("Loaded {} tracks from {}", tracks.len(), path.display());
        }

        Ok(Self { path, tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, source_id: &str) -> Option<&TrackRecord> {
        self.tracks.get(source_id)
    }

    /// Register a track sighting: create the record with unknown availability
    /// or refresh the metadata of an existing one, and add the playlist
    /// membership. Persisted before returning.
    pub fn upsert(
        &mut self,
        source_id: &str,
        name: &str,
        primary_artist: &str,
        album: &str,
        playlist_id: Option<&str>,
    ) -> Result<()> {
        let record = self
            .tracks
            .entry(source_id.to_string())
            .or_insert_with(|| TrackRecord::new(source_id, name, primary_artist, album));

        record.name = name.to_string();
        record.primary_artist = primary_artist.to_string();
        if !album.is_empty() {
            record.album = album.to_string();
        }
        if let Some(playlist_id) = playlist_id {
            record.playlist_ids.insert(playlist_id.to_string());
        }

        self.save()
    }

    /// Record a search outcome for a track. Unknown source ids are a caller
    /// ordering bug; they are logged and ignored, never an error.
    pub fn record_resolution(
        &mut self,
        source_id: &str,
        destination_id: Option<&str>,
        available: bool,
    ) -> Result<()> {
        let Some(record) = self.tracks.get_mut(source_id) else {
            warn!("Resolution recorded for unknown track {}, ignoring", source_id);
            return Ok(());
        };

        record.destination_id = destination_id.map(str::to_string);
        record.destination_availability = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        record.last_resolved_at = Some(Utc::now());

        self.save()
    }

    pub fn tracks_for_playlist(&self, playlist_id: &str) -> Vec<&TrackRecord> {
        self.tracks
            .values()
            .filter(|t| t.playlist_ids.contains(playlist_id))
            .collect()
    }

    /// Tracks in a playlist the resolver still needs to look at: never
    /// searched, or available but missing their destination id.
    pub fn query_unresolved(&self, playlist_id: &str) -> Vec<&TrackRecord> {
        self.tracks_for_playlist(playlist_id)
            .into_iter()
            .filter(|t| t.needs_resolution())
            .collect()
    }

    pub fn unavailable_tracks(&self) -> Vec<&TrackRecord> {
        self.tracks
            .values()
            .filter(|t| t.destination_availability == Availability::Unavailable)
            .collect()
    }

    pub fn compute_stats(&self, playlist_id: Option<&str>) -> SyncStats {
        let mut stats = SyncStats::default();

        let records: Vec<&TrackRecord> = match playlist_id {
            Some(id) => self.tracks_for_playlist(id),
            None => self.tracks.values().collect(),
        };

        for record in records {
            match record.destination_availability {
                Availability::Available => stats.available += 1,
                Availability::Unavailable => stats.unavailable += 1,
                Availability::Unknown => stats.unknown += 1,
            }
        }

        stats
    }

    /// Write all records to a temp file in the same directory, then rename
    /// over the live file. The rename is the commit point.
    pub fn save(&self) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let temp_path = self.temp_path();
        {
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            for record in self.tracks.values() {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        dir.join(format!(".library.tmp-{}", std::process::id()))
    }

    /// Export tracks missing from the destination catalog, one per line.
    pub fn export_unavailable(&self, output: &Path) -> Result<usize> {
        let unavailable = self.unavailable_tracks();

        let file = fs::File::create(output)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "artist\ttrack\talbum\tsource_id\tnotes")?;
        for track in &unavailable {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}",
                track.primary_artist, track.name, track.album, track.source_id, track.notes
            )?;
        }
        writer.flush()?;

        Ok(unavailable.len())
    }

    pub fn summary(&self) -> String {
        let stats = self.compute_stats(None);
        [
            format!("Music library: {}", self.path.display()),
            format!("Total tracks: {}", stats.total()),
            format!("  Available on Tidal: {}", stats.available),
            format!("  Unavailable: {}", stats.unavailable),
            format!("  Not searched: {}", stats.unknown),
            format!("  Match rate: {:.1}%", stats.match_rate()),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(dir: &tempfile::TempDir) -> LibraryStore {
        LibraryStore::open(dir.path().join("library.jsonl")).unwrap()
    }

    #[test]
    fn test_upsert_creates_unknown_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store
            .upsert("s1", "Blue Monday", "New Order", "Power, Corruption & Lies", Some("p1"))
            .unwrap();

        let record = store.get("s1").unwrap();
        assert_eq!(record.destination_availability, Availability::Unknown);
        assert!(record.destination_id.is_none());
        assert!(record.last_resolved_at.is_none());
        assert!(record.playlist_ids.contains("p1"));
    }

    #[test]
    fn test_upsert_appends_membership() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.upsert("s1", "Track", "Artist", "", Some("p1")).unwrap();
        store.upsert("s1", "Track", "Artist", "", Some("p2")).unwrap();
        store.upsert("s1", "Track (Remastered)", "Artist", "", None).unwrap();

        let record = store.get("s1").unwrap();
        assert_eq!(record.playlist_ids.len(), 2);
        assert_eq!(record.name, "Track (Remastered)");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_resolution_found_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.upsert("s1", "A", "X", "", Some("p1")).unwrap();
        store.upsert("s2", "B", "Y", "", Some("p1")).unwrap();

        store.record_resolution("s1", Some("t100"), true).unwrap();
        store.record_resolution("s2", None, false).unwrap();

        let found = store.get("s1").unwrap();
        assert_eq!(found.destination_availability, Availability::Available);
        assert_eq!(found.destination_id.as_deref(), Some("t100"));
        assert!(found.last_resolved_at.is_some());

        let missing = store.get("s2").unwrap();
        assert_eq!(missing.destination_availability, Availability::Unavailable);
        assert!(missing.destination_id.is_none());
    }

    #[test]
    fn test_record_resolution_unknown_id_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.record_resolution("nope", Some("t1"), true).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_query_unresolved_includes_repair_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.upsert("unsearched", "A", "X", "", Some("p1")).unwrap();
        store.upsert("found", "B", "Y", "", Some("p1")).unwrap();
        store.upsert("missing", "C", "Z", "", Some("p1")).unwrap();
        store.upsert("other", "D", "W", "", Some("p2")).unwrap();

        store.record_resolution("found", Some("t1"), true).unwrap();
        store.record_resolution("missing", None, false).unwrap();

        // Simulate a record marked available but missing its id
        store.upsert("repair", "E", "V", "", Some("p1")).unwrap();
        store.record_resolution("repair", None, true).unwrap();

        let unresolved: Vec<&str> = store
            .query_unresolved("p1")
            .iter()
            .map(|t| t.source_id.as_str())
            .collect();

        assert!(unresolved.contains(&"unsearched"));
        assert!(unresolved.contains(&"repair"));
        assert!(!unresolved.contains(&"found"));
        assert!(!unresolved.contains(&"missing"));
        assert!(!unresolved.contains(&"other"));
    }

    #[test]
    fn test_compute_stats_match_rate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        for i in 0..8 {
            let id = format!("a{}", i);
            store.upsert(&id, "T", "A", "", Some("p1")).unwrap();
            store.record_resolution(&id, Some(&format!("t{}", i)), true).unwrap();
        }
        for i in 0..2 {
            let id = format!("u{}", i);
            store.upsert(&id, "T", "A", "", Some("p1")).unwrap();
            store.record_resolution(&id, None, false).unwrap();
        }

        let stats = store.compute_stats(Some("p1"));
        assert_eq!(stats.available, 8);
        assert_eq!(stats.unavailable, 2);
        assert_eq!(stats.unknown, 0);
        assert_eq!(stats.match_rate(), 80.0);
    }

    #[test]
    fn test_compute_stats_no_division_by_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.upsert("s1", "T", "A", "", Some("p1")).unwrap();

        let stats = store.compute_stats(Some("p1"));
        assert_eq!(stats.available, 0);
        assert_eq!(stats.unavailable, 0);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.match_rate(), 0.0);
    }

    #[test]
    fn test_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.jsonl");

        {
            let mut store = LibraryStore::open(&path).unwrap();
            store.upsert("s1", "A", "X", "Album", Some("p1")).unwrap();
            store.record_resolution("s1", Some("t1"), true).unwrap();
            store.upsert("s2", "B", "Y", "", Some("p1")).unwrap();
        }

        let reloaded = LibraryStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        let record = reloaded.get("s1").unwrap();
        assert_eq!(record.destination_id.as_deref(), Some("t1"));
        assert_eq!(record.destination_availability, Availability::Available);
        assert_eq!(
            reloaded.get("s2").unwrap().destination_availability,
            Availability::Unknown
        );
    }

    #[test]
    fn test_tristate_tokens_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.jsonl");

        let mut store = LibraryStore::open(&path).unwrap();
        store.upsert("s1", "A", "X", "", None).unwrap();
        store.upsert("s2", "B", "Y", "", None).unwrap();
        store.record_resolution("s2", None, false).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"unset\""));
        assert!(contents.contains("\"false\""));
        // No temp file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_malformed_line_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.jsonl");

        {
            let mut store = LibraryStore::open(&path).unwrap();
            store.upsert("s1", "A", "X", "", None).unwrap();
        }
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("{not json\n");
        fs::write(&path, contents).unwrap();

        let reloaded = LibraryStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }
}
