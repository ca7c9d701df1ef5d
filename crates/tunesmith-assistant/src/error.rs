// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Debug, Clone, Error)]
pub enum AssistantError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not connected to Music Assistant")]
    NotConnected,

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Request timed out: {command}")]
    Timeout { command: String },

    #[error("Music Assistant error: {code} - {message}")]
    Protocol { code: String, message: String },

    #[error("Connection closed while request was pending")]
    Disconnected,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid response from Music Assistant: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for AssistantError {
    fn from(err: serde_json::Error) -> Self {
        AssistantError::InvalidResponse(err.to_string())
    }
}
