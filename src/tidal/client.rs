use std::collections::HashSet;
use std::io::{self, Write};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{DestinationCatalog, DestinationPlaylist};
use crate::error::{AppError, Result};
use crate::matcher::pick_best;

const TIDAL_API_BASE: &str = "https://openapi.tidal.com/v2";
const TIDAL_AUTH_URL: &str = "https://auth.tidal.com/v1/oauth2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceAuthResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    verification_uri_complete: Option<String>,
    expires_in: u64,
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Vec<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: u64,
    title: String,
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreatePlaylistRequest {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlaylist {
    uuid: String,
    name: String,
    number_of_tracks: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPage {
    items: Vec<ApiPlaylist>,
    total_number_of_items: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistTrackPage {
    items: Vec<ApiTrack>,
    total_number_of_items: usize,
}

pub struct TidalClient {
    http_client: Client,
    access_token: String,
    user_id: String,
}

impl TidalClient {
    pub async fn new(client_id: &str, client_secret: &str) -> Result<Self> {
        let http_client = Client::new();

        // Device authorization flow
        let device_auth = Self::device_authorization(&http_client, client_id).await?;

        println!("\nTidal Authentication Required");
        println!("==============================");
        if let Some(uri) = &device_auth.verification_uri_complete {
            println!("Visit this URL: {}", uri);
        } else {
            println!("Visit: {}", device_auth.verification_uri);
            println!("Enter code: {}", device_auth.user_code);
        }
        println!("\nWaiting for authentication...");

        let token = Self::poll_for_token(
            &http_client,
            client_id,
            client_secret,
            &device_auth.device_code,
            device_auth.interval,
            device_auth.expires_in,
        )
        .await?;

        info!("Successfully authenticated with Tidal");

        let user_id = "me".to_string();

        Ok(Self {
            http_client,
            access_token: token.access_token,
            user_id,
        })
    }

    async fn device_authorization(client: &Client, client_id: &str) -> Result<DeviceAuthResponse> {
        let response = client
            .post(format!("{}/device_authorization", TIDAL_AUTH_URL))
            .form(&[
                ("client_id", client_id),
                ("scope", "playlists.read playlists.write"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Device authorization failed: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to parse device auth response: {}", e)))
    }

    async fn poll_for_token(
        client: &Client,
        client_id: &str,
        client_secret: &str,
        device_code: &str,
        interval: u64,
        expires_in: u64,
    ) -> Result<TokenResponse> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_secs(expires_in);

        loop {
            if start.elapsed() > timeout {
                return Err(AppError::Auth("Device authorization timed out".into()));
            }

            tokio::time::sleep(std::time::Duration::from_secs(interval)).await;

            let response = client
                .post(format!("{}/token", TIDAL_AUTH_URL))
                .basic_auth(client_id, Some(client_secret))
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("device_code", device_code),
                ])
                .send()
                .await?;

            if response.status().is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| AppError::Auth(format!("Failed to parse token response: {}", e)));
            }

            let error_text = response.text().await.unwrap_or_default();
            if !error_text.contains("authorization_pending") {
                return Err(AppError::Auth(format!(
                    "Token request failed: {}",
                    error_text
                )));
            }

            print!(".");
            io::stdout().flush().ok();
        }
    }

    /// One search request, best candidate picked locally. The caller owns
    /// the pacing between calls.
    async fn search_once(&self, name: &str, artist: &str) -> Result<Option<String>> {
        let query = format!("{} {}", artist, name);
        let url = format!(
            "{}/searchresults/{}/relationships/tracks",
            TIDAL_API_BASE,
            urlencoding::encode(&query)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("countryCode", "US"), ("limit", "20")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::TidalApi(format!(
                "Search failed ({}): {}",
                status, error_text
            )));
        }

        let search_response: SearchResponse = response
            .json()
            .await
            .unwrap_or(SearchResponse { tracks: None });
        let candidates = search_response.tracks.unwrap_or_default();

        let pairs: Vec<(&str, &str)> = candidates
            .iter()
            .map(|t| {
                let artist = t.artists.first().map(|a| a.name.as_str()).unwrap_or("");
                (t.title.as_str(), artist)
            })
            .collect();

        match pick_best(name, artist, pairs) {
            Some(index) => {
                let track = &candidates[index];
                debug!("Matched '{} - {}' to Tidal track {}", artist, name, track.id);
                Ok(Some(track.id.to_string()))
            }
            None => {
                debug!("No acceptable match for '{} - {}'", artist, name);
                Ok(None)
            }
        }
    }

    async fn fetch_user_playlists(&self) -> Result<Vec<DestinationPlaylist>> {
        let url = format!("{}/users/{}/playlists", TIDAL_API_BASE, self.user_id);
        let mut playlists = Vec::new();
        let mut offset = 0usize;
        let limit = 50usize;

        loop {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[
                    ("countryCode", "US".to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(AppError::TidalApi(format!(
                    "Failed to list playlists: {}",
                    error_text
                )));
            }

            let page: PlaylistPage = response.json().await?;
            let fetched = page.items.len();
            for playlist in page.items {
                playlists.push(DestinationPlaylist {
                    id: playlist.uuid,
                    name: playlist.name,
                    track_count: playlist.number_of_tracks,
                });
            }

            offset += fetched;
            if offset >= page.total_number_of_items || fetched == 0 {
                break;
            }
        }

        info!("Found {} Tidal playlists", playlists.len());
        Ok(playlists)
    }

    async fn fetch_playlist_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>> {
        let url = format!("{}/playlists/{}/tracks", TIDAL_API_BASE, playlist_id);
        let mut track_ids = HashSet::new();
        let mut offset = 0usize;
        let limit = 100usize;

        loop {
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[
                    ("countryCode", "US".to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(AppError::TidalApi(format!(
                    "Failed to list playlist tracks: {}",
                    error_text
                )));
            }

            let page: PlaylistTrackPage = response.json().await?;
            let fetched = page.items.len();
            for track in page.items {
                track_ids.insert(track.id.to_string());
            }

            offset += fetched;
            if offset >= page.total_number_of_items || fetched == 0 {
                break;
            }
        }

        Ok(track_ids)
    }
}

impl DestinationCatalog for TidalClient {
    async fn list_user_playlists(&self) -> Result<Vec<DestinationPlaylist>> {
        self.fetch_user_playlists().await
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let url = format!("{}/users/{}/playlists", TIDAL_API_BASE, self.user_id);

        let request = CreatePlaylistRequest {
            name: name.to_string(),
            description: Some(description.to_string()),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::TidalApi(format!(
                "Failed to create playlist: {}",
                error_text
            )));
        }

        let playlist: ApiPlaylist = response.json().await?;
        info!("Created Tidal playlist: {}", playlist.name);

        Ok(playlist.uuid)
    }

    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>> {
        self.fetch_playlist_track_ids(playlist_id).await
    }

    async fn search_track(&self, name: &str, artist: &str) -> Result<Option<String>> {
        self.search_once(name, artist).await
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        if track_ids.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/playlists/{}/relationships/tracks",
            TIDAL_API_BASE, playlist_id
        );

        let track_data: Vec<_> = track_ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "type": "tracks"}))
            .collect();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({"data": track_data}))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Failed to add tracks to playlist: {}", error_text);
            return Err(AppError::TidalApi(format!(
                "Failed to add tracks: {}",
                error_text
            )));
        }

        info!("Added {} tracks to playlist", track_ids.len());
        Ok(())
    }
}
