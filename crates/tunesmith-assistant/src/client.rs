// SPDX-License-Identifier: GPL-3.0-or-later

use crate::correlator::{Correlator, DEFAULT_MESSAGE_PREFIX, DEFAULT_REQUEST_TIMEOUT};
use crate::error::Result;
use crate::transport::WebSocketSession;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Music Assistant WebSocket API client.
///
/// One client owns one connection. Commands are correlated with their
/// responses by `message_id` and fail after the configured request timeout.
pub struct MusicAssistantClient {
    correlator: Arc<Correlator>,
    session: WebSocketSession,
}

impl MusicAssistantClient {
    /// Connect with default settings.
    ///
    /// # Example
    /// ```no_run
    /// # use tunesmith_assistant::{MusicAssistantClient, MusicLibrary};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = MusicAssistantClient::connect("http://homeassistant.local:8095").await?;
    /// let tracks = client.search_tracks("Teardrop", "Massive Attack", 5).await?;
    /// client.disconnect().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(base_url: &str) -> Result<Self> {
        Self::builder().connect(base_url).await
    }

    /// Create a client builder for custom configuration.
    pub fn builder() -> MusicAssistantClientBuilder {
        MusicAssistantClientBuilder::default()
    }

    /// Send a raw command and return its `result` payload.
    pub async fn send_command(&self, command: &str, args: Value) -> Result<Value> {
        self.correlator.submit(&self.session, command, args).await
    }

    /// Send a command and decode its `result` payload.
    pub(crate) async fn command<T: DeserializeOwned>(&self, command: &str, args: Value) -> Result<T> {
        let result = self.send_command(command, args).await?;
        trace!(target: "assistant", %command, %result, "decoding result");
        Ok(serde_json::from_value(result)?)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Reject all in-flight commands and close the connection. Idempotent.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }
}

/// Builder for configuring a Music Assistant client.
#[derive(Debug, Clone)]
pub struct MusicAssistantClientBuilder {
    request_timeout: Duration,
    message_prefix: String,
}

impl Default for MusicAssistantClientBuilder {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            message_prefix: DEFAULT_MESSAGE_PREFIX.to_string(),
        }
    }
}

impl MusicAssistantClientBuilder {
    /// Set how long a command may wait for its response.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the prefix of generated message ids.
    pub fn message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.message_prefix = prefix.into();
        self
    }

    /// Open the connection.
    pub async fn connect(self, base_url: &str) -> Result<MusicAssistantClient> {
        let correlator = Arc::new(Correlator::new(self.message_prefix, self.request_timeout));
        let session = WebSocketSession::connect(base_url, correlator.clone()).await?;
        Ok(MusicAssistantClient {
            correlator,
            session,
        })
    }
}
