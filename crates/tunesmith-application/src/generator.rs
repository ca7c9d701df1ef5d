// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end playlist workflow: favorites, suggestions, matching, saving.

use crate::jobs::{JobProgress, JobStore, JobStoreError, JobUpdate};
use crate::matching::{MatchProgress, MatchSummary, MatchingOptions, TrackMatch, TrackMatcher};
use crate::settings::SettingsStore;
use crate::suggestions::{SuggestionError, SuggestionSource};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tunesmith_assistant::{AssistantError, LibraryConnector, MusicLibrary};
use tunesmith_domain::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Music Assistant server url is not configured")]
    MissingServerUrl,

    #[error(transparent)]
    Suggestions(#[from] SuggestionError),

    #[error("Music Assistant: {0}")]
    Library(#[from] AssistantError),

    #[error(transparent)]
    Job(#[from] JobStoreError),

    #[error("no matched tracks to save")]
    NothingToSave,
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPlaylist {
    pub playlist_id: String,
    pub track_count: usize,
}

/// Drives a prompt through suggestion, matching, and playlist creation.
///
/// Every phase opens its own connection and closes it before the next phase
/// starts.
pub struct PlaylistGenerator<C, S, T> {
    connector: C,
    suggestions: S,
    settings: T,
    options: MatchingOptions,
}

impl<C, S, T> PlaylistGenerator<C, S, T>
where
    C: LibraryConnector,
    S: SuggestionSource,
    T: SettingsStore,
{
    pub fn new(connector: C, suggestions: S, settings: T, options: MatchingOptions) -> Self {
        Self {
            connector,
            suggestions,
            settings,
            options,
        }
    }

    /// Suggest tracks for `prompt` and match them against the library.
    ///
    /// # Returns
    ///
    /// * `Ok(matches)` - one record per suggestion, in suggestion order
    /// * `Err(GeneratorError::MissingServerUrl)` - no server configured
    /// * `Err(GeneratorError::Suggestions)` - the suggestion source failed
    /// * `Err(GeneratorError::Library)` - the matching connection could not be opened
    pub async fn generate(
        &self,
        prompt: &str,
        progress: &dyn MatchProgress,
    ) -> GeneratorResult<Vec<TrackMatch>> {
        self.run_phases(prompt, progress, &|_: JobUpdate| {}).await
    }

    /// Run [`generate`](Self::generate) for a stored job, recording phase
    /// changes and per-track progress on it.
    pub async fn run_job<J>(&self, store: &J, job_id: JobId) -> GeneratorResult<Vec<TrackMatch>>
    where
        J: JobStore + ?Sized,
    {
        let prompt = store
            .get(job_id)
            .ok_or(JobStoreError::NotFound(job_id))?
            .prompt;
        let progress = JobProgress::new(store, job_id);
        let record = |update: JobUpdate| {
            if let Err(error) = store.update(job_id, update) {
                warn!(target: "generator", %job_id, %error, "could not record job update");
            }
        };

        match self.run_phases(&prompt, &progress, &record).await {
            Ok(matches) => {
                store.update(job_id, JobUpdate::Tracks(matches.clone()))?;
                store.update(job_id, JobUpdate::Status(JobStatus::Completed))?;
                Ok(matches)
            }
            Err(error) => {
                warn!(target: "generator", %job_id, %error, "playlist job failed");
                store.update(job_id, JobUpdate::Failed(error.to_string()))?;
                Err(error)
            }
        }
    }

    /// Create a playlist named `name` holding every matched track's selected result.
    pub async fn save_playlist(
        &self,
        name: &str,
        matches: &[TrackMatch],
    ) -> GeneratorResult<SavedPlaylist> {
        let uris = MatchSummary::from_matches(matches).uris;
        if uris.is_empty() {
            return Err(GeneratorError::NothingToSave);
        }

        let base_url = self.server_url().await?;
        let provider = self.settings.playlist_provider().await;
        let library = self.connector.connect(&base_url).await?;

        let saved = async {
            let playlist_id = library.create_playlist(name, provider.as_deref()).await?;
            library.add_tracks_to_playlist(&playlist_id, &uris).await?;
            Ok::<_, AssistantError>(playlist_id)
        }
        .await;
        library.disconnect().await;

        let playlist_id = saved?;
        info!(
            target: "generator",
            %playlist_id,
            %name,
            tracks = uris.len(),
            "playlist saved"
        );
        Ok(SavedPlaylist {
            playlist_id,
            track_count: uris.len(),
        })
    }

    async fn run_phases(
        &self,
        prompt: &str,
        progress: &dyn MatchProgress,
        record: &(dyn Fn(JobUpdate) + Send + Sync),
    ) -> GeneratorResult<Vec<TrackMatch>> {
        let base_url = self.server_url().await?;

        record(JobUpdate::Status(JobStatus::FetchingFavorites));
        let favorites = self.favorite_artist_names(&base_url).await;

        record(JobUpdate::Status(JobStatus::Suggesting));
        let suggestions = self.suggestions.suggest(prompt, &favorites).await?;
        info!(
            target: "generator",
            count = suggestions.len(),
            favorites = favorites.len(),
            "received suggestions"
        );

        record(JobUpdate::Tracks(
            suggestions.iter().cloned().map(TrackMatch::pending).collect(),
        ));
        record(JobUpdate::Status(JobStatus::Matching));

        let library = Arc::new(self.connector.connect(&base_url).await?);
        let options = self
            .options
            .clone()
            .with_provider_preferences(self.settings.provider_preferences().await);
        let matcher = TrackMatcher::new(library.clone(), options);

        let matches = matcher
            .match_tracks_progressively(&suggestions, progress)
            .await;
        library.disconnect().await;

        Ok(matches)
    }

    /// Favorite artist names from a short-lived connection. Any failure
    /// yields an empty list.
    async fn favorite_artist_names(&self, base_url: &str) -> Vec<String> {
        let library = match self.connector.connect(base_url).await {
            Ok(library) => library,
            Err(error) => {
                warn!(target: "generator", %error, "skipping favorite artists");
                return Vec::new();
            }
        };

        let artists = library.favorite_artists().await;
        library.disconnect().await;

        artists.into_iter().map(|artist| artist.name).collect()
    }

    async fn server_url(&self) -> GeneratorResult<String> {
        self.settings
            .music_assistant_url()
            .await
            .filter(|url| !url.trim().is_empty())
            .ok_or(GeneratorError::MissingServerUrl)
    }
}
