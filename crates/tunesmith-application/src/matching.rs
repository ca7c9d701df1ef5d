// SPDX-License-Identifier: GPL-3.0-or-later

//! Matching of suggested tracks against the media server library.
//!
//! Each suggestion is searched with a bounded number of attempts and an
//! escalating backoff. Suggestions are processed in fixed-size batches:
//! tracks inside a batch are searched concurrently, batches run one after
//! another with a short pause in between, and every state change is reported
//! to a [`MatchProgress`] sink as it happens.

use crate::ranking::sort_by_provider_weight;
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use tunesmith_assistant::{MaTrack, MusicLibrary};
use tunesmith_config::MatchingConfig;
use tunesmith_domain::TrackSuggestion;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchSelectionError {
    #[error("track has no alternatives to choose from")]
    NoAlternatives,

    #[error("alternative index {index} out of range (have {available})")]
    OutOfRange { index: usize, available: usize },
}

/// A suggestion paired with its search outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub suggestion: TrackSuggestion,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ma_track: Option<MaTrack>,
    /// Full ranked result list, kept only when the search returned more than one candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<MaTrack>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_match_index: Option<usize>,
    /// Set while a search for this track is in flight.
    #[serde(default)]
    pub matching: bool,
}

impl TrackMatch {
    pub fn pending(suggestion: TrackSuggestion) -> Self {
        Self {
            suggestion,
            matched: false,
            ma_track: None,
            alternatives: None,
            selected_match_index: None,
            matching: false,
        }
    }

    pub fn unmatched(suggestion: TrackSuggestion) -> Self {
        Self::pending(suggestion)
    }

    /// Build a matched record from a non-empty, already ranked result list.
    fn from_ranked(suggestion: TrackSuggestion, mut ranked: Vec<MaTrack>) -> Self {
        if ranked.len() == 1 {
            return Self {
                ma_track: ranked.pop(),
                matched: true,
                ..Self::pending(suggestion)
            };
        }

        Self {
            ma_track: ranked.first().cloned(),
            matched: true,
            alternatives: Some(ranked),
            selected_match_index: Some(0),
            ..Self::pending(suggestion)
        }
    }

    /// Make alternative `index` the primary match.
    pub fn select_alternative(&mut self, index: usize) -> Result<(), MatchSelectionError> {
        let alternatives = self
            .alternatives
            .as_ref()
            .ok_or(MatchSelectionError::NoAlternatives)?;
        let chosen = alternatives
            .get(index)
            .cloned()
            .ok_or(MatchSelectionError::OutOfRange {
                index,
                available: alternatives.len(),
            })?;

        self.ma_track = Some(chosen);
        self.selected_match_index = Some(index);
        self.matched = true;
        Ok(())
    }

    /// URI of the chosen result, if the track matched.
    pub fn selected_uri(&self) -> Option<&str> {
        if !self.matched {
            return None;
        }
        self.ma_track.as_ref().map(|track| track.uri.as_str())
    }
}

/// Counts and URIs of a finished match run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub uris: Vec<String>,
}

impl MatchSummary {
    pub fn from_matches(matches: &[TrackMatch]) -> Self {
        let uris: Vec<String> = matches
            .iter()
            .filter_map(TrackMatch::selected_uri)
            .map(str::to_string)
            .collect();

        Self {
            total: matches.len(),
            matched: uris.len(),
            unmatched: matches.len() - uris.len(),
            uris,
        }
    }
}

/// Receives incremental match state. Called from inside the matching loop,
/// so implementations must return quickly.
pub trait MatchProgress: Send + Sync {
    fn report(&self, index: usize, track: &TrackMatch);
}

impl<F> MatchProgress for F
where
    F: Fn(usize, &TrackMatch) + Send + Sync,
{
    fn report(&self, index: usize, track: &TrackMatch) {
        self(index, track)
    }
}

#[derive(Debug, Clone)]
pub struct MatchingOptions {
    pub batch_size: usize,
    pub max_attempts: u32,
    /// Multiplied by the attempt number to get the wait before the next attempt.
    pub retry_backoff: Duration,
    pub batch_pause: Duration,
    pub search_limit: u32,
    /// Provider keywords, highest priority first.
    pub provider_preferences: Vec<String>,
}

impl MatchingOptions {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            search_limit: config.search_limit,
            provider_preferences: Vec::new(),
        }
    }

    pub fn with_provider_preferences(mut self, preferences: Vec<String>) -> Self {
        self.provider_preferences = preferences;
        self
    }
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

/// Matches suggestions against a [`MusicLibrary`].
pub struct TrackMatcher<L: ?Sized> {
    library: Arc<L>,
    options: MatchingOptions,
}

impl<L> TrackMatcher<L>
where
    L: MusicLibrary + ?Sized,
{
    pub fn new(library: Arc<L>, options: MatchingOptions) -> Self {
        Self { library, options }
    }

    pub fn options(&self) -> &MatchingOptions {
        &self.options
    }

    /// Search for one suggestion, retrying failed or empty searches.
    ///
    /// Never fails: when every attempt errors or comes back empty the result
    /// is an unmatched record.
    pub async fn match_track(&self, suggestion: &TrackSuggestion) -> TrackMatch {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self
                .library
                .search_tracks(&suggestion.title, &suggestion.artist, self.options.search_limit)
                .await
            {
                Ok(results) if !results.is_empty() => {
                    debug!(
                        target: "matching",
                        %suggestion,
                        attempt,
                        hits = results.len(),
                        "suggestion matched"
                    );
                    let ranked = sort_by_provider_weight(results, &self.options.provider_preferences);
                    return TrackMatch::from_ranked(suggestion.clone(), ranked);
                }
                Ok(_) => {
                    debug!(target: "matching", %suggestion, attempt, "search returned no results");
                }
                Err(error) => {
                    warn!(target: "matching", %suggestion, attempt, %error, "search failed");
                }
            }

            if attempt < max_attempts {
                let delay = self.options.retry_backoff * attempt;
                debug!(target: "matching", %suggestion, ?delay, "retrying search after delay");
                sleep(delay).await;
            }
        }

        debug!(target: "matching", %suggestion, max_attempts, "no match after all attempts");
        TrackMatch::unmatched(suggestion.clone())
    }

    /// Match every suggestion in batches, reporting each state change.
    ///
    /// Before a batch starts each of its tracks is reported with
    /// `matching = true`; each track is reported again with its terminal
    /// state as soon as its own search finishes. The returned list is in
    /// suggestion order.
    pub async fn match_tracks_progressively(
        &self,
        suggestions: &[TrackSuggestion],
        progress: &dyn MatchProgress,
    ) -> Vec<TrackMatch> {
        let mut tracks: Vec<TrackMatch> = suggestions
            .iter()
            .cloned()
            .map(TrackMatch::pending)
            .collect();

        let batch_size = self.options.batch_size.max(1);
        let batch_count = tracks.len().div_ceil(batch_size);

        for (batch_index, start) in (0..tracks.len()).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(tracks.len());

            for (index, track) in tracks.iter_mut().enumerate().take(end).skip(start) {
                track.matching = true;
                progress.report(index, track);
            }

            info!(
                target: "matching",
                batch = batch_index + 1,
                batches = batch_count,
                size = end - start,
                "matching batch"
            );

            let batch: Vec<(usize, TrackMatch)> =
                (start..end).map(|index| (index, tracks[index].clone())).collect();
            let searches = batch.into_iter().map(|(index, current)| {
                async move {
                    let outcome = AssertUnwindSafe(self.match_track(&current.suggestion))
                        .catch_unwind()
                        .await;
                    let updated = match outcome {
                        Ok(updated) => updated,
                        Err(_) => {
                            error!(
                                target: "matching",
                                index,
                                suggestion = %current.suggestion,
                                "matching aborted unexpectedly"
                            );
                            TrackMatch {
                                matching: false,
                                ..current
                            }
                        }
                    };
                    progress.report(index, &updated);
                    (index, updated)
                }
            });

            for (index, updated) in join_all(searches).await {
                tracks[index] = updated;
            }

            if end < tracks.len() {
                sleep(self.options.batch_pause).await;
            }
        }

        let matched = tracks.iter().filter(|track| track.matched).count();
        info!(
            target: "matching",
            total = tracks.len(),
            matched,
            "matching finished"
        );
        tracks
    }
}
