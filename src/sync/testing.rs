//! Scripted in-memory catalogs for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::catalog::{
    DestinationCatalog, DestinationPlaylist, SourceCatalog, SourcePlaylist, SourceTrack,
};
use crate::error::{AppError, Result};

#[derive(Clone, Default)]
pub struct MockSource {
    pub user_id: String,
    pub playlists: Vec<SourcePlaylist>,
    pub tracks: HashMap<String, Vec<SourceTrack>>,
    pub fail_tracks_for: HashSet<String>,
}

impl MockSource {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn add_playlist(&mut self, id: &str, name: &str, tracks: Vec<SourceTrack>) {
        self.playlists.push(SourcePlaylist {
            id: id.to_string(),
            name: name.to_string(),
            track_count: tracks.len(),
            description: String::new(),
        });
        self.tracks.insert(id.to_string(), tracks);
    }
}

impl SourceCatalog for MockSource {
    async fn current_user_id(&self) -> Result<String> {
        Ok(self.user_id.clone())
    }

    async fn list_owned_playlists(&self) -> Result<Vec<SourcePlaylist>> {
        Ok(self.playlists.clone())
    }

    async fn list_tracks(&self, playlist_id: &str) -> Result<Vec<SourceTrack>> {
        if self.fail_tracks_for.contains(playlist_id) {
            return Err(AppError::Io(std::io::Error::other("scripted fetch failure")));
        }
        Ok(self.tracks.get(playlist_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct MockDestState {
    playlists: Vec<DestinationPlaylist>,
    members: HashMap<String, HashSet<String>>,
    search_results: HashMap<String, String>,
    created: Vec<(String, String)>,
    add_calls: Vec<(String, Vec<String>)>,
    add_attempts: usize,
    search_calls: usize,
    member_fetches: usize,
    fail_searches: usize,
    fail_adds: usize,
    fail_listings: usize,
    next_id: usize,
}

/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct MockDest {
    state: Arc<Mutex<MockDestState>>,
}

impl MockDest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_playlist(&self, name: &str, id: &str, members: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.playlists.push(DestinationPlaylist {
            id: id.to_string(),
            name: name.to_string(),
            track_count: Some(members.len()),
        });
        state.members.insert(
            id.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    pub fn add_playlist_with_count(&self, name: &str, id: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.playlists.push(DestinationPlaylist {
            id: id.to_string(),
            name: name.to_string(),
            track_count: Some(count),
        });
        state.members.insert(id.to_string(), HashSet::new());
    }

    pub fn clear_track_counts(&self) {
        let mut state = self.state.lock().unwrap();
        for playlist in &mut state.playlists {
            playlist.track_count = None;
        }
    }

    /// Make a search for `name` (any artist) return `id`.
    pub fn script_search(&self, name: &str, id: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        match id {
            Some(id) => state.search_results.insert(name.to_string(), id.to_string()),
            None => state.search_results.remove(name),
        };
    }

    pub fn fail_next_searches(&self, n: usize) {
        self.state.lock().unwrap().fail_searches = n;
    }

    pub fn fail_next_adds(&self, n: usize) {
        self.state.lock().unwrap().fail_adds = n;
    }

    pub fn fail_next_listings(&self, n: usize) {
        self.state.lock().unwrap().fail_listings = n;
    }

    pub fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    pub fn member_fetches(&self) -> usize {
        self.state.lock().unwrap().member_fetches
    }

    pub fn add_attempts(&self) -> usize {
        self.state.lock().unwrap().add_attempts
    }

    /// Successful add calls only, in order.
    pub fn add_calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().add_calls.clone()
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn members_of(&self, playlist_id: &str) -> HashSet<String> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl DestinationCatalog for MockDest {
    async fn list_user_playlists(&self) -> Result<Vec<DestinationPlaylist>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_listings > 0 {
            state.fail_listings -= 1;
            return Err(AppError::TidalApi("scripted listing failure".into()));
        }
        Ok(state.playlists.clone())
    }

    async fn create_playlist(&self, name: &str, _description: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("dest-{}", state.next_id);
        state.playlists.push(DestinationPlaylist {
            id: id.clone(),
            name: name.to_string(),
            track_count: Some(0),
        });
        state.members.insert(id.clone(), HashSet::new());
        state.created.push((name.to_string(), id.clone()));
        Ok(id)
    }

    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>> {
        let mut state = self.state.lock().unwrap();
        state.member_fetches += 1;
        Ok(state.members.get(playlist_id).cloned().unwrap_or_default())
    }

    async fn search_track(&self, name: &str, _artist: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        if state.fail_searches > 0 {
            state.fail_searches -= 1;
            return Err(AppError::TidalApi("scripted search failure".into()));
        }
        Ok(state.search_results.get(name).cloned())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let state = &mut *state;
        state.add_attempts += 1;
        if state.fail_adds > 0 {
            state.fail_adds -= 1;
            return Err(AppError::TidalApi("scripted add failure".into()));
        }
        state
            .add_calls
            .push((playlist_id.to_string(), track_ids.to_vec()));
        let members = state.members.entry(playlist_id.to_string()).or_default();
        for id in track_ids {
            members.insert(id.clone());
        }
        let count = members.len();
        if let Some(playlist) = state.playlists.iter_mut().find(|p| p.id == playlist_id) {
            playlist.track_count = Some(count);
        }
        Ok(())
    }
}
