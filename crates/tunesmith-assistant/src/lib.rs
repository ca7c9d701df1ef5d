// SPDX-License-Identifier: GPL-3.0-or-later

//! Music Assistant client for searching tracks and building playlists.
//!
//! This crate provides a WebSocket client for the Music Assistant server API:
//! a persistent connection, request/response correlation with per-request
//! timeouts, and typed library operations (track search, favorite artists,
//! playlist creation).

pub mod client;
pub mod correlator;
pub mod error;
pub mod library;
pub mod models;
pub mod transport;

pub use client::{MusicAssistantClient, MusicAssistantClientBuilder};
pub use correlator::{Correlator, FrameHandler, FrameSink};
pub use error::{AssistantError, Result};
pub use library::{LibraryConnector, MusicAssistantConnector, MusicLibrary};
pub use models::{MaArtist, MaItemRef, MaPlaylist, MaTrack};
pub use transport::{websocket_url, WebSocketSession};
