// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use tunesmith_config::AppConfig;

/// Source of the user-editable settings the playlist workflow reads.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn music_assistant_url(&self) -> Option<String>;

    /// Provider keywords, highest priority first.
    async fn provider_preferences(&self) -> Vec<String>;

    async fn playlist_provider(&self) -> Option<String> {
        None
    }
}

/// Settings backed by the loaded application configuration.
#[derive(Debug, Clone)]
pub struct ConfigSettings {
    config: AppConfig,
}

impl ConfigSettings {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SettingsStore for ConfigSettings {
    async fn music_assistant_url(&self) -> Option<String> {
        self.config
            .music_assistant
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    /// Configured keywords, trimmed, with blank entries dropped.
    async fn provider_preferences(&self) -> Vec<String> {
        self.config
            .music_assistant
            .provider_preferences
            .iter()
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect()
    }

    async fn playlist_provider(&self) -> Option<String> {
        self.config.music_assistant.playlist_provider.clone()
    }
}
