// SPDX-License-Identifier: GPL-3.0-or-later

use crate::correlator::{FrameHandler, FrameSink};
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

/// Fixed path of the Music Assistant WebSocket API.
pub const WEBSOCKET_PATH: &str = "/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Turn a server base URL into its WebSocket endpoint.
///
/// `http` becomes `ws`, `https` becomes `wss`, and the API path is appended
/// after any trailing slash is stripped.
pub fn websocket_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())
        .map_err(|e| AssistantError::Connection(format!("invalid server url {base_url:?}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AssistantError::Connection(format!(
                "unsupported url scheme {other:?}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| AssistantError::Connection(format!("cannot use scheme {scheme}")))?;

    let path = format!("{}{}", url.path().trim_end_matches('/'), WEBSOCKET_PATH);
    url.set_path(&path);
    Ok(url)
}

/// One persistent WebSocket connection. Inbound text frames are handed,
/// unparsed, to a [`FrameHandler`].
pub struct WebSocketSession {
    url: Url,
    sink: Mutex<Option<WsSink>>,
    connected: Arc<AtomicBool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    handler: Arc<dyn FrameHandler>,
}

impl WebSocketSession {
    /// Open a connection to `base_url` and start forwarding frames to `handler`.
    pub async fn connect(base_url: &str, handler: Arc<dyn FrameHandler>) -> Result<Self> {
        let url = websocket_url(base_url)?;
        debug!(target: "assistant", %url, "opening websocket");

        // Already installed by an earlier connection or by the host application.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| AssistantError::Connection(format!("{url}: {e}")))?;
        let (sink, stream) = stream.split();

        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(stream, handler.clone(), connected.clone()));

        info!(target: "assistant", %url, "connected to Music Assistant");
        Ok(Self {
            url,
            sink: Mutex::new(Some(sink)),
            connected,
            reader: std::sync::Mutex::new(Some(reader)),
            handler,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Send one raw frame.
    pub async fn send(&self, frame: String) -> Result<()> {
        if !self.is_connected() {
            return Err(AssistantError::NotConnected);
        }

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(AssistantError::NotConnected)?;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| AssistantError::Send(e.to_string()))
    }

    /// Close the connection. Pending requests are rejected before the socket
    /// is closed. Safe to call more than once.
    pub async fn disconnect(&self) {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        self.handler.on_closed();

        self.abort_reader();

        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!(target: "assistant", error = %e, "error while closing websocket");
            }
        }

        if was_connected {
            info!(target: "assistant", url = %self.url, "disconnected from Music Assistant");
        }
    }
}

impl WebSocketSession {
    fn abort_reader(&self) {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reader) = reader.take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl FrameSink for WebSocketSession {
    async fn send_frame(&self, frame: String) -> Result<()> {
        self.send(frame).await
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.abort_reader();
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    handler: Arc<dyn FrameHandler>,
    connected: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                trace!(target: "assistant", frame = %text, "frame received");
                handler.on_frame(&text);
            }
            Ok(Message::Close(frame)) => {
                debug!(target: "assistant", ?frame, "server closed the connection");
                break;
            }
            Ok(_) => trace!(target: "assistant", "ignoring non-text frame"),
            Err(e) => {
                warn!(target: "assistant", error = %e, "websocket read failed");
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
    handler.on_closed();
}
