//! Destination-side duplicate detection.
//!
//! A name-keyed cache of the user's destination playlists is built once per
//! run; member sets and track counts are fetched lazily and cached for the
//! rest of the run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::catalog::DestinationCatalog;

#[derive(Debug, Clone)]
struct CachedPlaylist {
    id: String,
    track_count: Option<usize>,
}

#[derive(Debug, Default)]
pub struct DuplicateDetector {
    by_name: HashMap<String, CachedPlaylist>,
    members_by_id: HashMap<String, HashSet<String>>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate the user's destination playlists into the cache. A listing
    /// failure degrades to an empty cache with a warning; the run then
    /// behaves as if no destination playlists existed.
    pub async fn build<D: DestinationCatalog>(catalog: &D) -> Self {
        let mut detector = Self::new();

        match catalog.list_user_playlists().await {
            Ok(playlists) => {
                for playlist in playlists {
                    detector.by_name.insert(
                        playlist.name.clone(),
                        CachedPlaylist {
                            id: playlist.id,
                            track_count: playlist.track_count,
                        },
                    );
                }
                info!("Cached {} Tidal playlists", detector.by_name.len());
            }
            Err(e) => {
                warn!("Could not cache Tidal playlists: {}", e);
            }
        }

        detector
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// O(1) lookup of an existing destination playlist by name.
    pub fn find_existing(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|p| p.id.as_str())
    }

    /// Register a playlist created during this run so later playlists with
    /// the same name reuse it.
    pub fn note_created(&mut self, name: &str, id: &str) {
        self.by_name.insert(
            name.to_string(),
            CachedPlaylist {
                id: id.to_string(),
                track_count: Some(0),
            },
        );
        self.members_by_id.insert(id.to_string(), HashSet::new());
    }

    /// Destination track ids already present in a playlist, fetched once per
    /// run. A fetch failure degrades to an empty set with a warning, the
    /// result is not cached so a later attempt can retry.
    pub async fn fetch_members<D: DestinationCatalog>(
        &mut self,
        catalog: &D,
        playlist_id: &str,
    ) -> HashSet<String> {
        if let Some(members) = self.members_by_id.get(playlist_id) {
            return members.clone();
        }

        match catalog.playlist_track_ids(playlist_id).await {
            Ok(members) => {
                debug!("Playlist {} has {} existing tracks", playlist_id, members.len());
                self.members_by_id
                    .insert(playlist_id.to_string(), members.clone());
                members
            }
            Err(e) => {
                warn!("Could not fetch Tidal playlist tracks: {}", e);
                HashSet::new()
            }
        }
    }

    /// The already-fully-synced decision: a same-named destination playlist
    /// exists and holds at least `threshold` (e.g. 0.80) of the source's
    /// track count. The slack tolerates tracks absent from the destination
    /// catalog. Never calls the track resolver.
    pub async fn decide_synced<D: DestinationCatalog>(
        &mut self,
        catalog: &D,
        name: &str,
        source_track_count: usize,
        threshold: f64,
    ) -> bool {
        let Some(entry) = self.by_name.get(name) else {
            return false;
        };
        let id = entry.id.clone();

        let track_count = match entry.track_count {
            Some(count) => count,
            None => {
                let count = self.fetch_members(catalog, &id).await.len();
                if let Some(entry) = self.by_name.get_mut(name) {
                    entry.track_count = Some(count);
                }
                count
            }
        };

        let min_expected = (source_track_count as f64 * threshold) as usize;
        track_count >= min_expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::MockDest;

    #[tokio::test]
    async fn test_find_existing_by_name() {
        let dest = MockDest::new();
        dest.add_playlist("Gym Mix", "d1", &["t1", "t2"]);

        let detector = DuplicateDetector::build(&dest).await;
        assert_eq!(detector.find_existing("Gym Mix"), Some("d1"));
        assert_eq!(detector.find_existing("Unknown"), None);
    }

    #[tokio::test]
    async fn test_fetch_members_cached_per_run() {
        let dest = MockDest::new();
        dest.add_playlist("Gym Mix", "d1", &["t1", "t2"]);

        let mut detector = DuplicateDetector::build(&dest).await;
        let first = detector.fetch_members(&dest, "d1").await;
        let second = detector.fetch_members(&dest, "d1").await;

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(dest.member_fetches(), 1);
    }

    #[tokio::test]
    async fn test_decide_synced_boundary() {
        let dest = MockDest::new();
        dest.add_playlist_with_count("Big", "d1", 40);
        dest.add_playlist_with_count("Small", "d2", 39);

        let mut detector = DuplicateDetector::build(&dest).await;
        assert!(detector.decide_synced(&dest, "Big", 50, 0.80).await);
        assert!(!detector.decide_synced(&dest, "Small", 50, 0.80).await);
        assert!(!detector.decide_synced(&dest, "Absent", 50, 0.80).await);
    }

    #[tokio::test]
    async fn test_decide_synced_lazy_count_fetch() {
        let dest = MockDest::new();
        dest.add_playlist("Lazy", "d1", &["t1", "t2", "t3", "t4"]);
        dest.clear_track_counts();

        let mut detector = DuplicateDetector::build(&dest).await;
        assert!(detector.decide_synced(&dest, "Lazy", 5, 0.80).await);
        // Count was cached; no second member fetch
        assert!(detector.decide_synced(&dest, "Lazy", 5, 0.80).await);
        assert_eq!(dest.member_fetches(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_degrades_to_empty_cache() {
        let dest = MockDest::new();
        dest.add_playlist("Gym Mix", "d1", &[]);
        dest.fail_next_listings(1);

        let detector = DuplicateDetector::build(&dest).await;
        assert!(detector.is_empty());
    }

    #[tokio::test]
    async fn test_note_created_registers_playlist() {
        let dest = MockDest::new();
        let mut detector = DuplicateDetector::build(&dest).await;

        detector.note_created("Fresh", "d9");
        assert_eq!(detector.find_existing("Fresh"), Some("d9"));
        assert!(detector.fetch_members(&dest, "d9").await.is_empty());
        assert_eq!(dest.member_fetches(), 0);
    }
}
