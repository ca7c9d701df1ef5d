// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory stand-ins for the library, connector, and collaborators.

use crate::matching::{MatchProgress, TrackMatch};
use crate::settings::SettingsStore;
use crate::suggestions::{SuggestionError, SuggestionSource};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tunesmith_assistant::{AssistantError, LibraryConnector, MaArtist, MaTrack, MusicLibrary};
use tunesmith_domain::TrackSuggestion;

pub fn ma_track(id: &str, provider: &str) -> MaTrack {
    MaTrack {
        item_id: id.to_string(),
        provider: provider.to_string(),
        name: format!("Track {}", id),
        uri: format!("{}://track/{}", provider, id),
        artists: Vec::new(),
        album: None,
        duration: None,
    }
}

pub fn ma_artist(name: &str) -> MaArtist {
    MaArtist {
        item_id: name.to_lowercase(),
        provider: "library".to_string(),
        name: name.to_string(),
        uri: format!("library://artist/{}", name.to_lowercase()),
        favorite: true,
    }
}

#[derive(Clone)]
pub enum SearchOutcome {
    Hits(Vec<MaTrack>),
    Fail,
    Panic,
}

#[derive(Default)]
struct LibraryState {
    scripts: Mutex<HashMap<String, VecDeque<SearchOutcome>>>,
    searches: Mutex<Vec<(String, Instant)>>,
    favorites: Mutex<Vec<MaArtist>>,
    created: Mutex<Vec<(String, Option<String>)>>,
    added: Mutex<Vec<(String, Vec<String>)>>,
    disconnects: AtomicUsize,
    latency: Mutex<Duration>,
}

/// Scripted library. Searches for unscripted titles return no hits; the
/// last scripted outcome for a title repeats once the script runs out.
#[derive(Clone, Default)]
pub struct FakeLibrary {
    state: Arc<LibraryState>,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, title: &str, outcomes: Vec<SearchOutcome>) -> &Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(title.to_string(), outcomes.into());
        self
    }

    pub fn with_latency(&self, latency: Duration) -> &Self {
        *self.state.latency.lock().unwrap() = latency;
        self
    }

    pub fn with_favorites(&self, names: &[&str]) -> &Self {
        *self.state.favorites.lock().unwrap() = names.iter().map(|n| ma_artist(n)).collect();
        self
    }

    pub fn searches(&self) -> Vec<(String, Instant)> {
        self.state.searches.lock().unwrap().clone()
    }

    pub fn search_count(&self, title: &str) -> usize {
        self.searches().iter().filter(|(t, _)| t == title).count()
    }

    pub fn created_playlists(&self) -> Vec<(String, Option<String>)> {
        self.state.created.lock().unwrap().clone()
    }

    pub fn added_tracks(&self) -> Vec<(String, Vec<String>)> {
        self.state.added.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, title: &str) -> SearchOutcome {
        let mut scripts = self.state.scripts.lock().unwrap();
        match scripts.get_mut(title) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or(SearchOutcome::Hits(Vec::new())),
            None => SearchOutcome::Hits(Vec::new()),
        }
    }
}

#[async_trait]
impl MusicLibrary for FakeLibrary {
    async fn search_tracks(
        &self,
        title: &str,
        _artist: &str,
        _limit: u32,
    ) -> Result<Vec<MaTrack>, AssistantError> {
        self.state
            .searches
            .lock()
            .unwrap()
            .push((title.to_string(), Instant::now()));

        let latency = *self.state.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.next_outcome(title) {
            SearchOutcome::Hits(tracks) => Ok(tracks),
            SearchOutcome::Fail => Err(AssistantError::Timeout {
                command: "music/search".to_string(),
            }),
            SearchOutcome::Panic => panic!("search blew up for {}", title),
        }
    }

    async fn favorite_artists(&self) -> Vec<MaArtist> {
        self.state.favorites.lock().unwrap().clone()
    }

    async fn create_playlist(
        &self,
        name: &str,
        provider_instance: Option<&str>,
    ) -> Result<String, AssistantError> {
        let mut created = self.state.created.lock().unwrap();
        created.push((name.to_string(), provider_instance.map(str::to_string)));
        Ok(format!("pl-{}", created.len()))
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), AssistantError> {
        self.state
            .added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), uris.to_vec()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out the same [`FakeLibrary`]; connection number `fail_on` (1-based) fails.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub library: FakeLibrary,
    connects: Arc<AtomicUsize>,
    fail_on: Option<usize>,
}

impl FakeConnector {
    pub fn new(library: FakeLibrary) -> Self {
        Self {
            library,
            connects: Arc::new(AtomicUsize::new(0)),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on = Some(attempt);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LibraryConnector for FakeConnector {
    type Library = FakeLibrary;

    async fn connect(&self, base_url: &str) -> Result<FakeLibrary, AssistantError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(AssistantError::Connection(format!("{}: refused", base_url)));
        }
        Ok(self.library.clone())
    }
}

#[derive(Clone)]
pub struct StaticSuggestions {
    suggestions: Result<Vec<TrackSuggestion>, String>,
    seen_favorites: Arc<Mutex<Vec<String>>>,
}

impl StaticSuggestions {
    pub fn new(suggestions: Vec<TrackSuggestion>) -> Self {
        Self {
            suggestions: Ok(suggestions),
            seen_favorites: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            suggestions: Err(message.to_string()),
            seen_favorites: Arc::default(),
        }
    }

    pub fn seen_favorites(&self) -> Vec<String> {
        self.seen_favorites.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionSource for StaticSuggestions {
    async fn suggest(
        &self,
        _prompt: &str,
        favorite_artists: &[String],
    ) -> Result<Vec<TrackSuggestion>, SuggestionError> {
        *self.seen_favorites.lock().unwrap() = favorite_artists.to_vec();
        self.suggestions.clone().map_err(SuggestionError)
    }
}

#[derive(Clone, Default)]
pub struct StaticSettings {
    pub url: Option<String>,
    pub preferences: Vec<String>,
    pub playlist_provider: Option<String>,
}

impl StaticSettings {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn music_assistant_url(&self) -> Option<String> {
        self.url.clone()
    }

    async fn provider_preferences(&self) -> Vec<String> {
        self.preferences.clone()
    }

    async fn playlist_provider(&self) -> Option<String> {
        self.playlist_provider.clone()
    }
}

/// One progress report: index, `matching` flag, `matched` flag.
pub type ProgressEntry = (usize, bool, bool);

/// Records every progress report in arrival order.
#[derive(Default)]
pub struct ProgressLog {
    entries: Mutex<Vec<ProgressEntry>>,
}

impl ProgressLog {
    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl MatchProgress for ProgressLog {
    fn report(&self, index: usize, track: &TrackMatch) {
        self.entries
            .lock()
            .unwrap()
            .push((index, track.matching, track.matched));
    }
}
