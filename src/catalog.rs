//! Capability interfaces for the two streaming catalogs.
//!
//! The sync engine only ever talks to these traits; `SpotifyClient` and
//! `TidalClient` implement them over the real APIs, and tests substitute
//! scripted in-memory catalogs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A playlist summary on the source platform. Tracks are fetched separately
/// so that completed playlists can be skipped without paging track lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePlaylist {
    pub id: String,
    pub name: String,
    pub track_count: usize,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTrack {
    pub id: String,
    pub name: String,
    /// Ordered, primary artist first.
    pub artists: Vec<String>,
    pub album: String,
}

impl SourceTrack {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.as_str()).unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationPlaylist {
    pub id: String,
    pub name: String,
    pub track_count: Option<usize>,
}

/// Read access to the platform playlists are copied from.
pub trait SourceCatalog {
    async fn current_user_id(&self) -> Result<String>;

    /// Playlists owned by the authenticated user, in platform order.
    async fn list_owned_playlists(&self) -> Result<Vec<SourcePlaylist>>;

    /// All tracks of one playlist, fully materialized in playlist order.
    async fn list_tracks(&self, playlist_id: &str) -> Result<Vec<SourceTrack>>;
}

/// Read/write access to the platform playlists are copied to.
pub trait DestinationCatalog {
    async fn list_user_playlists(&self) -> Result<Vec<DestinationPlaylist>>;

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>>;

    /// Best-effort name/artist search; `Ok(None)` means no acceptable match.
    async fn search_track(&self, name: &str, artist: &str) -> Result<Option<String>>;

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}

#[cfg(test)]
impl SourceTrack {
    pub fn mock(id: &str, name: &str, artist: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            artists: vec![artist.to_string()],
            album: "Mock Album".to_string(),
        }
    }
}
