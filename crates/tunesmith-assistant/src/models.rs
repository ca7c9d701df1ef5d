// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Wire frames
// ============================================================================

/// Outbound command frame.
#[derive(Debug, Clone, Serialize)]
pub struct CommandFrame<'a> {
    pub message_id: &'a str,
    pub command: &'a str,
    pub args: &'a Value,
}

/// Inbound frame. Success frames carry `result`, error frames carry `error`,
/// server-pushed events carry neither a `message_id` nor a `result`.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingFrame {
    #[serde(default, deserialize_with = "optional_id_string")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl IncomingFrame {
    /// Correlation id, treating an empty id the same as a missing one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Server-supplied rejection of a command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, deserialize_with = "id_string_or_empty")]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Media entities
// ============================================================================

/// Track as returned by Music Assistant search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaTrack {
    #[serde(deserialize_with = "id_string")]
    pub item_id: String,
    /// Provider instance or domain that supplied this result (e.g. "library", "spotify--a1b2").
    pub provider: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<MaItemRef>,
    #[serde(default)]
    pub album: Option<MaItemRef>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
}

impl MaTrack {
    /// Artist names joined for display.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Minimal reference to another media item (artist or album on a track).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaItemRef {
    #[serde(default, deserialize_with = "id_string_or_empty")]
    pub item_id: String,
    #[serde(default)]
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

/// Library artist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaArtist {
    #[serde(deserialize_with = "id_string")]
    pub item_id: String,
    #[serde(default)]
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub favorite: bool,
}

/// Playlist as returned after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaPlaylist {
    #[serde(deserialize_with = "id_string")]
    pub item_id: String,
    #[serde(default)]
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

/// Result payload of the search command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub tracks: Vec<MaTrack>,
}

/// Listing commands answer either with a bare array or a paged envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemList<T> {
    Paged { items: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ItemList<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ItemList::Paged { items } => items,
            ItemList::Bare(items) => items,
        }
    }
}

// ============================================================================
// Id normalization
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn id_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(String::from)
        .unwrap_or_default())
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}
