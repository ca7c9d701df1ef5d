// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicAssistantConfig {
    /// Base URL of the Music Assistant server, e.g. `http://homeassistant.local:8095`.
    pub url: Option<String>,
    pub request_timeout_secs: u64,
    /// Provider keywords in priority order (first entry wins ties).
    pub provider_preferences: Vec<String>,
    /// Provider instance new playlists are created on; server default when unset.
    pub playlist_provider: Option<String>,
}

impl MusicAssistantConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MusicAssistantConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: 10,
            provider_preferences: Vec::new(),
            playlist_provider: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub batch_pause_ms: u64,
    pub search_limit: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            batch_pause_ms: 100,
            search_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub music_assistant: MusicAssistantConfig,
    pub matching: MatchingConfig,
    pub telemetry: TelemetryConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: TUNESMITH_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("TUNESMITH_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        server_configured = config.music_assistant.url.is_some(),
        "configuration loaded"
    );
    Ok(config)
}
