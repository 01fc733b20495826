use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_redirect_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let spotify_client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| AppError::Config("SPOTIFY_CLIENT_ID not set".into()))?;

        let spotify_client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| AppError::Config("SPOTIFY_CLIENT_SECRET not set".into()))?;

        let spotify_redirect_uri = std::env::var("SPOTIFY_REDIRECT_URI")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/callback".to_string());

        Ok(Self {
            spotify_client_id,
            spotify_client_secret,
            spotify_redirect_uri,
        })
    }

    pub fn get_missing_config(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.spotify_client_id.is_empty() {
            missing.push("SPOTIFY_CLIENT_ID".to_string());
        }
        if self.spotify_client_secret.is_empty() {
            missing.push("SPOTIFY_CLIENT_SECRET".to_string());
        }

        missing
    }

    pub fn validate_spotify_config(&self) -> bool {
        !self.spotify_client_id.is_empty() && !self.spotify_client_secret.is_empty()
    }
}

/// Pacing and batching knobs for the transfer engine.
///
/// The delays are unconditional rate-limit pacing, not I/O waits: an actual
/// search always pays `search_throttle`, a confirmed batch write always pays
/// `batch_pause`, and consecutive playlists are separated by `playlist_pause`.
/// Cached fast paths (sync-only skips, identity-store hits) pay none of them.
#[derive(Debug, Clone)]
pub struct SyncTuning {
    /// Delay after every destination search call.
    pub search_throttle: Duration,
    /// Number of resolved tracks accumulated before a playlist write.
    pub batch_size: usize,
    /// Delay before retrying a failed batch write (retried exactly once).
    pub batch_retry_backoff: Duration,
    /// Delay after every batch write.
    pub batch_pause: Duration,
    /// Delay between playlists.
    pub playlist_pause: Duration,
    /// Fraction of source tracks the destination playlist must hold for the
    /// playlist to count as already synced.
    pub synced_threshold: f64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            search_throttle: Duration::from_millis(1500),
            batch_size: 50,
            batch_retry_backoff: Duration::from_secs(5),
            batch_pause: Duration::from_secs(3),
            playlist_pause: Duration::from_secs(5),
            synced_threshold: 0.80,
        }
    }
}

impl SyncTuning {
    /// Minimum destination track count for a source playlist to be
    /// considered synced. The tolerance accounts for tracks that simply do
    /// not exist in the destination catalog.
    pub fn min_synced_tracks(&self, source_track_count: usize) -> usize {
        (source_track_count as f64 * self.synced_threshold) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_threshold_boundary() {
        let tuning = SyncTuning::default();
        assert_eq!(tuning.min_synced_tracks(50), 40);
        assert_eq!(tuning.min_synced_tracks(0), 0);
        assert_eq!(tuning.min_synced_tracks(3), 2);
    }
}
