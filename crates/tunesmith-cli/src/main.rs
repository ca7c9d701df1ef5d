// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunesmith_application::{
    sort_by_provider_weight, ConfigSettings, MatchSummary, MatchingOptions, PlaylistGenerator,
    SettingsStore, SuggestionError, SuggestionSource, TrackMatch,
};
use tunesmith_assistant::{LibraryConnector, MusicAssistantConnector, MusicLibrary};
use tunesmith_config::{load as load_config, AppConfig};
use tunesmith_domain::TrackSuggestion;

#[derive(Debug, Parser)]
#[command(name = "tunesmith", version, about = "Match suggested tracks against a Music Assistant library")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "TUNESMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Music Assistant base URL; overrides the configured one.
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List favorite artists.
    Favorites,

    /// Search the library for one track.
    Search {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
    },

    /// Match a JSON file of suggestions and optionally save them as a playlist.
    Match {
        /// JSON array of `{"title", "artist", "album"?}` objects.
        #[arg(long)]
        suggestions: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
        /// Save the matched tracks to a new playlist with this name.
        #[arg(long)]
        playlist: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(server) = cli.server.clone() {
        config.music_assistant.url = Some(server);
    }
    init_tracing(&config.telemetry.log_level);

    tokio::select! {
        result = run(cli.command, config) => result,
        _ = shutdown_signal() => Ok(()),
    }
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let connector = MusicAssistantConnector::new(config.music_assistant.request_timeout());
    let settings = ConfigSettings::new(config.clone());

    match command {
        Command::Favorites => {
            let library = connector.connect(&server_url(&settings).await?).await?;
            let artists = library.favorite_artists().await;
            library.disconnect().await;

            for artist in artists {
                println!("{}", artist.name);
            }
        }
        Command::Search { title, artist } => {
            let library = connector.connect(&server_url(&settings).await?).await?;
            let results = library
                .search_tracks(&title, &artist, config.matching.search_limit)
                .await;
            library.disconnect().await;

            let ranked = sort_by_provider_weight(results?, &settings.provider_preferences().await);
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        Command::Match {
            suggestions,
            prompt,
            playlist,
        } => {
            let source = FileSuggestionSource::from_path(&suggestions)?;
            let prompt = prompt.unwrap_or_else(|| suggestions.display().to_string());
            let options = MatchingOptions::from_config(&config.matching);
            let generator = PlaylistGenerator::new(connector, source, settings, options);

            let report = |index: usize, track: &TrackMatch| {
                if !track.matching {
                    info!(
                        target: "cli",
                        index,
                        suggestion = %track.suggestion,
                        matched = track.matched,
                        uri = track.selected_uri().unwrap_or("-"),
                        "track done"
                    );
                }
            };
            let matches = generator.generate(&prompt, &report).await?;

            let summary = MatchSummary::from_matches(&matches);
            info!(
                target: "cli",
                total = summary.total,
                matched = summary.matched,
                unmatched = summary.unmatched,
                "matching summary"
            );
            println!("{}", serde_json::to_string_pretty(&matches)?);

            if let Some(name) = playlist {
                let saved = generator.save_playlist(&name, &matches).await?;
                println!("{}", serde_json::to_string_pretty(&saved)?);
            }
        }
    }

    Ok(())
}

async fn server_url(settings: &ConfigSettings) -> Result<String> {
    settings
        .music_assistant_url()
        .await
        .context("no Music Assistant server configured (set --server or music_assistant.url)")
}

/// Suggestions read from a JSON file instead of a generative model.
struct FileSuggestionSource {
    suggestions: Vec<TrackSuggestion>,
}

impl FileSuggestionSource {
    fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading suggestions from {}", path.display()))?;
        let suggestions: Vec<TrackSuggestion> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing suggestions in {}", path.display()))?;
        Ok(Self { suggestions })
    }
}

#[async_trait]
impl SuggestionSource for FileSuggestionSource {
    async fn suggest(
        &self,
        prompt: &str,
        favorite_artists: &[String],
    ) -> Result<Vec<TrackSuggestion>, SuggestionError> {
        debug!(
            target: "cli",
            %prompt,
            favorites = favorite_artists.len(),
            "using suggestions from file"
        );
        if self.suggestions.is_empty() {
            return Err(SuggestionError("suggestion file is empty".to_string()));
        }
        Ok(self.suggestions.clone())
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let mut interrupt = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("install SIGINT handler");

    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("install SIGTERM handler");

    #[cfg(not(unix))]
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
    }

    #[cfg(not(unix))]
    {
        interrupt.await.expect("ctrl_c handler");
    }

    info!(target: "cli", "shutdown signal received, abandoning work");
}
