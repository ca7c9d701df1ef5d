// SPDX-License-Identifier: GPL-3.0-or-later

//! Typed library operations on top of the command channel.

use crate::client::MusicAssistantClient;
use crate::error::Result;
use crate::models::{ItemList, MaArtist, MaPlaylist, MaTrack, SearchResults};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const SEARCH_COMMAND: &str = "music/search";
pub const FAVORITE_ARTISTS_COMMAND: &str = "music/artists/library_items";
pub const CREATE_PLAYLIST_COMMAND: &str = "music/playlists/create_playlist";
pub const ADD_PLAYLIST_TRACKS_COMMAND: &str = "music/playlists/add_playlist_tracks";

/// Media library operations the playlist workflow depends on.
#[async_trait]
pub trait MusicLibrary: Send + Sync {
    /// Search tracks by title, filtered by artist. Zero hits is an empty list.
    async fn search_tracks(&self, title: &str, artist: &str, limit: u32) -> Result<Vec<MaTrack>>;

    /// Artists marked as favorite. Never fails; an unavailable server yields
    /// an empty list.
    async fn favorite_artists(&self) -> Vec<MaArtist>;

    /// Create a playlist and return its server-assigned id.
    async fn create_playlist(&self, name: &str, provider_instance: Option<&str>) -> Result<String>;

    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    async fn disconnect(&self);
}

/// Opens a [`MusicLibrary`] for a server base URL.
#[async_trait]
pub trait LibraryConnector: Send + Sync {
    type Library: MusicLibrary + 'static;

    async fn connect(&self, base_url: &str) -> Result<Self::Library>;
}

#[async_trait]
impl MusicLibrary for MusicAssistantClient {
    async fn search_tracks(&self, title: &str, artist: &str, limit: u32) -> Result<Vec<MaTrack>> {
        let args = json!({
            "search_query": title,
            "artist": artist,
            "media_types": ["track"],
            "limit": limit,
            "library_only": false,
        });

        let results: Option<SearchResults> = self.command(SEARCH_COMMAND, args).await?;
        let tracks = results.unwrap_or_default().tracks;
        debug!(target: "assistant", %title, %artist, hits = tracks.len(), "track search finished");
        Ok(tracks)
    }

    async fn favorite_artists(&self) -> Vec<MaArtist> {
        let args = json!({ "favorite": true });
        match self
            .command::<Option<ItemList<MaArtist>>>(FAVORITE_ARTISTS_COMMAND, args)
            .await
        {
            Ok(list) => list.map(ItemList::into_items).unwrap_or_default(),
            Err(error) => {
                warn!(target: "assistant", %error, "could not load favorite artists, continuing without");
                Vec::new()
            }
        }
    }

    async fn create_playlist(&self, name: &str, provider_instance: Option<&str>) -> Result<String> {
        let mut args = json!({ "name": name });
        if let Some(provider) = provider_instance {
            args["provider_instance_or_domain"] = Value::from(provider);
        }

        let playlist: MaPlaylist = self.command(CREATE_PLAYLIST_COMMAND, args).await?;
        debug!(target: "assistant", playlist_id = %playlist.item_id, %name, "playlist created");
        Ok(playlist.item_id)
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        if uris.is_empty() {
            return Ok(());
        }

        let args = json!({ "db_playlist_id": playlist_id, "uris": uris });
        self.send_command(ADD_PLAYLIST_TRACKS_COMMAND, args).await?;
        debug!(target: "assistant", %playlist_id, count = uris.len(), "tracks added to playlist");
        Ok(())
    }

    async fn disconnect(&self) {
        MusicAssistantClient::disconnect(self).await;
    }
}

/// Connector that opens a fresh WebSocket client per call.
#[derive(Debug, Clone)]
pub struct MusicAssistantConnector {
    request_timeout: Duration,
}

impl MusicAssistantConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for MusicAssistantConnector {
    fn default() -> Self {
        Self::new(crate::correlator::DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl LibraryConnector for MusicAssistantConnector {
    type Library = MusicAssistantClient;

    async fn connect(&self, base_url: &str) -> Result<MusicAssistantClient> {
        MusicAssistantClient::builder()
            .request_timeout(self.request_timeout)
            .connect(base_url)
            .await
    }
}
