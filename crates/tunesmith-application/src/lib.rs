// SPDX-License-Identifier: GPL-3.0-or-later

//! Playlist generation workflow: match suggested tracks against a Music
//! Assistant library and turn the matches into a playlist.

pub mod generator;
pub mod jobs;
pub mod matching;
pub mod ranking;
pub mod settings;
pub mod suggestions;
#[cfg(test)]
mod test_support;

pub use generator::{GeneratorError, GeneratorResult, PlaylistGenerator, SavedPlaylist};
pub use jobs::{InMemoryJobStore, JobEvent, JobProgress, JobStore, JobStoreError, JobUpdate, PlaylistJob};
pub use matching::{
    MatchProgress, MatchSelectionError, MatchSummary, MatchingOptions, TrackMatch, TrackMatcher,
};
pub use ranking::{provider_weight, sort_by_provider_weight};
pub use settings::{ConfigSettings, SettingsStore};
pub use suggestions::{SuggestionError, SuggestionSource};
