use rspotify::{
    model::PlaylistId,
    prelude::*,
    scopes, AuthCodeSpotify, Credentials, OAuth,
};
use std::io::{self, Write};
use tracing::{debug, info};

use crate::catalog::{SourceCatalog, SourcePlaylist, SourceTrack};
use crate::config::Config;
use crate::error::{AppError, Result};

pub struct SpotifyClient {
    client: AuthCodeSpotify,
    user_id: String,
}

impl SpotifyClient {
    pub async fn new(config: &Config) -> Result<Self> {
        let creds = Credentials::new(&config.spotify_client_id, &config.spotify_client_secret);

        let oauth = OAuth {
            redirect_uri: config.spotify_redirect_uri.clone(),
            scopes: scopes!(
                "user-library-read",
                "playlist-read-private",
                "playlist-read-collaborative"
            ),
            ..Default::default()
        };

        let client = AuthCodeSpotify::new(creds, oauth);

        let auth_url = client.get_authorize_url(false)?;
        println!("\nOpen this URL in your browser to authorize Spotify:");
        println!("{}\n", auth_url);

        print!("Enter the URL you were redirected to: ");
        io::stdout().flush()?;

        let mut redirect_url = String::new();
        io::stdin().read_line(&mut redirect_url)?;

        let code = client
            .parse_response_code(redirect_url.trim())
            .ok_or_else(|| AppError::Auth("Failed to parse authorization code".into()))?;

        client.request_token(&code).await?;

        let user = client.current_user().await?;
        let user_id = user.id.to_string();
        let display_name = user.display_name.unwrap_or_else(|| user_id.clone());

        info!("Successfully authenticated as Spotify user: {}", display_name);

        Ok(Self { client, user_id })
    }

    /// Playlist summaries only. Track lists are paged per playlist on
    /// demand, so playlists the checkpoint already marks completed never
    /// cost a track fetch.
    async fn fetch_owned_playlists(&self) -> Result<Vec<SourcePlaylist>> {
        let mut playlists = Vec::new();
        let mut offset = 0;
        let limit = 50;

        loop {
            let page = self
                .client
                .current_user_playlists_manual(Some(limit), Some(offset))
                .await?;

            for playlist in &page.items {
                // Only playlists owned by the current user
                if playlist.owner.id.to_string() == self.user_id {
                    playlists.push(SourcePlaylist {
                        id: playlist.id.id().to_string(),
                        name: playlist.name.clone(),
                        track_count: playlist.tracks.total as usize,
                        // SimplifiedPlaylist has no description
                        description: String::new(),
                    });
                }
            }

            if page.next.is_none() {
                break;
            }
            offset += limit;
        }

        info!("Found {} owned Spotify playlists", playlists.len());
        Ok(playlists)
    }

    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<SourceTrack>> {
        let playlist_id = PlaylistId::from_id(playlist_id)
            .map_err(|e| AppError::Config(format!("Invalid playlist id: {}", e)))?;

        let mut tracks = Vec::new();
        let mut offset = 0;
        let limit = 100;

        loop {
            let page = self
                .client
                .playlist_items_manual(
                    playlist_id.clone_static(),
                    None,
                    None,
                    Some(limit),
                    Some(offset),
                )
                .await?;

            for item in &page.items {
                if let Some(rspotify::model::PlayableItem::Track(track)) = &item.track {
                    // Local tracks have no ID and cannot be matched
                    let Some(id) = &track.id else {
                        debug!("Skipping local track: {}", track.name);
                        continue;
                    };

                    tracks.push(SourceTrack {
                        id: id.id().to_string(),
                        name: track.name.clone(),
                        artists: track.artists.iter().map(|a| a.name.clone()).collect(),
                        album: track.album.name.clone(),
                    });
                }
            }

            if page.next.is_none() {
                break;
            }
            offset += limit;
        }

        Ok(tracks)
    }
}

impl SourceCatalog for SpotifyClient {
    async fn current_user_id(&self) -> Result<String> {
        Ok(self.user_id.clone())
    }

    async fn list_owned_playlists(&self) -> Result<Vec<SourcePlaylist>> {
        self.fetch_owned_playlists().await
    }

    async fn list_tracks(&self, playlist_id: &str) -> Result<Vec<SourceTrack>> {
        self.fetch_playlist_tracks(playlist_id).await
    }
}
