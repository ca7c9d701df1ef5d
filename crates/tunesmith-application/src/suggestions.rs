// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use thiserror::Error;
use tunesmith_domain::TrackSuggestion;

#[derive(Debug, Error)]
#[error("suggestion source failed: {0}")]
pub struct SuggestionError(pub String);

/// Produces track suggestions for a free-text prompt.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Suggest tracks for `prompt`. `favorite_artists` may be empty and is
    /// only a hint.
    async fn suggest(
        &self,
        prompt: &str,
        favorite_artists: &[String],
    ) -> Result<Vec<TrackSuggestion>, SuggestionError>;
}
