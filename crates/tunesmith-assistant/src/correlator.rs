// SPDX-License-Identifier: GPL-3.0-or-later

//! Request/response correlation over a fire-and-forget frame transport.
//!
//! Every outbound command gets a fresh `message_id` and a pending entry in a
//! shared map. Whoever removes that entry first (the inbound dispatcher, the
//! timeout path, or a connection teardown) owns the request's single terminal
//! outcome; every other path finds nothing and backs off.

use crate::error::{AssistantError, Result};
use crate::models::{CommandFrame, IncomingFrame};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, trace, warn};

pub const DEFAULT_MESSAGE_PREFIX: &str = "ts-";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound half of a transport.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_frame(&self, frame: String) -> Result<()>;
}

/// Inbound half of a transport: receives raw frames and lifecycle notices.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, raw: &str);

    fn on_closed(&self);
}

#[derive(Debug)]
struct PendingRequest {
    command: String,
    submitted_at: Instant,
    responder: oneshot::Sender<Result<Value>>,
}

#[derive(Debug)]
pub struct Correlator {
    prefix: String,
    sequence: AtomicU64,
    pending: Mutex<HashMap<String, PendingRequest>>,
    request_timeout: Duration,
}

impl Correlator {
    pub fn new(prefix: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Number of requests still awaiting a terminal outcome.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Send `command` through `sink` and wait for the correlated response.
    ///
    /// Resolves with the response's `result` payload. Fails with
    /// [`AssistantError::Protocol`] when the server answers with an error
    /// frame and [`AssistantError::Timeout`] when no answer arrives within the
    /// request timeout.
    pub async fn submit<S>(&self, sink: &S, command: &str, args: Value) -> Result<Value>
    where
        S: FrameSink + ?Sized,
    {
        let message_id = self.next_message_id();
        let frame = serde_json::to_string(&CommandFrame {
            message_id: &message_id,
            command,
            args: &args,
        })?;

        let (responder, mut receiver) = oneshot::channel();
        self.lock_pending().insert(
            message_id.clone(),
            PendingRequest {
                command: command.to_string(),
                submitted_at: Instant::now(),
                responder,
            },
        );
        // Clears the entry if this future is dropped mid-flight.
        let _guard = PendingGuard {
            correlator: self,
            message_id: &message_id,
        };

        trace!(target: "correlator", %message_id, %command, %frame, "sending frame");
        sink.send_frame(frame).await?;

        match timeout(self.request_timeout, &mut receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(AssistantError::Disconnected),
            Err(_) => {
                if self.lock_pending().remove(&message_id).is_some() {
                    warn!(
                        target: "correlator",
                        %message_id,
                        %command,
                        timeout = ?self.request_timeout,
                        "request timed out"
                    );
                    return Err(AssistantError::Timeout {
                        command: command.to_string(),
                    });
                }
                // The dispatcher removed the entry first; its outcome is already queued.
                receiver.try_recv().unwrap_or(Err(AssistantError::Disconnected))
            }
        }
    }

    /// Route one inbound frame to its pending request. Never fails: malformed
    /// frames, server events, and frames for unknown ids are dropped.
    pub fn dispatch(&self, raw: &str) {
        let frame: IncomingFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                let error = AssistantError::MalformedFrame(err.to_string());
                warn!(target: "correlator", %error, "dropping inbound frame");
                return;
            }
        };

        let Some(message_id) = frame.correlation_id().map(str::to_string) else {
            trace!(target: "correlator", "dropping server event");
            return;
        };

        let mut pending = self.lock_pending();
        let Some(request) = pending.remove(&message_id) else {
            debug!(target: "correlator", %message_id, "no pending request for frame, dropping");
            return;
        };

        let outcome = match frame.error {
            Some(error) => Err(AssistantError::Protocol {
                code: error.error_code,
                message: error.message,
            }),
            None => Ok(frame.result),
        };

        debug!(
            target: "correlator",
            %message_id,
            command = %request.command,
            elapsed = ?request.submitted_at.elapsed(),
            ok = outcome.is_ok(),
            "request completed"
        );
        // Sent while the map is still locked so a racing timeout sees either
        // the entry or the queued outcome, never neither.
        let _ = request.responder.send(outcome);
    }

    /// Reject every pending request with `reason` and empty the map.
    pub fn cancel_all(&self, reason: AssistantError) {
        let mut pending = self.lock_pending();
        if pending.is_empty() {
            return;
        }

        debug!(target: "correlator", count = pending.len(), %reason, "cancelling pending requests");
        for (_, request) in pending.drain() {
            let _ = request.responder.send(Err(reason.clone()));
        }
    }

    fn next_message_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.prefix, seq)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().expect("pending request lock poisoned")
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_PREFIX, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl FrameHandler for Correlator {
    fn on_frame(&self, raw: &str) {
        self.dispatch(raw);
    }

    fn on_closed(&self) {
        self.cancel_all(AssistantError::Disconnected);
    }
}

struct PendingGuard<'a> {
    correlator: &'a Correlator,
    message_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.correlator.lock_pending().remove(self.message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_frame(&self, frame: String) -> Result<()> {
            self.0
                .send(frame)
                .map_err(|e| AssistantError::Send(e.to_string()))
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl FrameSink for BrokenSink {
        async fn send_frame(&self, _frame: String) -> Result<()> {
            Err(AssistantError::Send("socket reset".to_string()))
        }
    }

    fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink(tx), rx)
    }

    fn message_id_of(frame: &str) -> String {
        let value: Value = serde_json::from_str(frame).expect("outbound frame is JSON");
        value["message_id"].as_str().expect("message_id").to_string()
    }

    #[tokio::test]
    async fn test_submit_resolves_with_result_payload() {
        let correlator = Correlator::default();
        let (sink, mut frames) = channel_sink();

        let respond = async {
            let frame = frames.recv().await.expect("frame sent");
            let sent: Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(sent["command"], "music/search");
            assert_eq!(sent["args"]["limit"], 5);

            let id = message_id_of(&frame);
            correlator.dispatch(&json!({"message_id": id, "result": {"tracks": []}}).to_string());
        };

        let (result, ()) = tokio::join!(
            correlator.submit(&sink, "music/search", json!({"limit": 5})),
            respond
        );

        assert_eq!(result.unwrap(), json!({"tracks": []}));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_frame_rejects_with_server_message() {
        let correlator = Correlator::default();
        let (sink, mut frames) = channel_sink();

        let respond = async {
            let id = message_id_of(&frames.recv().await.unwrap());
            correlator.dispatch(
                &json!({
                    "message_id": id,
                    "error": {"error_code": "invalid_args", "message": "name is required"}
                })
                .to_string(),
            );
        };

        let (result, ()) = tokio::join!(
            correlator.submit(&sink, "music/playlists/create_playlist", json!({})),
            respond
        );

        match result {
            Err(AssistantError::Protocol { code, message }) => {
                assert_eq!(code, "invalid_args");
                assert_eq!(message, "name is required");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry_and_ignores_late_response() {
        let correlator = Correlator::default();
        let (sink, mut frames) = channel_sink();

        let started = Instant::now();
        let result = correlator
            .submit(&sink, "music/search", json!({}))
            .await;

        match result {
            Err(AssistantError::Timeout { command }) => assert_eq!(command, "music/search"),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() >= DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(correlator.pending_count(), 0);

        // A response arriving after the timeout finds no entry and is dropped.
        let id = message_id_of(&frames.recv().await.unwrap());
        correlator.dispatch(&json!({"message_id": id, "result": []}).to_string());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_letters_do_not_disturb_pending_requests() {
        let correlator = Correlator::default();
        let (sink, mut frames) = channel_sink();

        let respond = async {
            let id = message_id_of(&frames.recv().await.unwrap());

            correlator.dispatch("{not json");
            correlator.dispatch(&json!({"event": "player_updated", "data": {}}).to_string());
            correlator.dispatch(&json!({"message_id": "", "result": 1}).to_string());
            correlator.dispatch(&json!({"message_id": "ts-999", "result": 1}).to_string());
            assert_eq!(correlator.pending_count(), 1);

            correlator.dispatch(&json!({"message_id": id, "result": "ok"}).to_string());
            // duplicate delivery is a no-op
            correlator.dispatch(&json!({"message_id": id, "result": "again"}).to_string());
        };

        let (result, ()) = tokio::join!(correlator.submit(&sink, "ping", json!({})), respond);

        assert_eq!(result.unwrap(), json!("ok"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_message_ids_are_prefixed_and_unique() {
        let correlator = Correlator::new("job7-", DEFAULT_REQUEST_TIMEOUT);
        let first = correlator.next_message_id();
        let second = correlator.next_message_id();

        assert_eq!(first, "job7-1");
        assert_eq!(second, "job7-2");
    }

    #[tokio::test]
    async fn test_send_failure_leaves_no_pending_entry() {
        let correlator = Correlator::default();

        let result = correlator.submit(&BrokenSink, "music/search", json!({})).await;

        assert!(matches!(result, Err(AssistantError::Send(_))));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_rejects_in_flight_requests() {
        let correlator = Correlator::default();
        let (sink, mut frames) = channel_sink();

        let teardown = async {
            frames.recv().await.unwrap();
            frames.recv().await.unwrap();
            assert_eq!(correlator.pending_count(), 2);
            correlator.on_closed();
        };

        let (first, second, ()) = tokio::join!(
            correlator.submit(&sink, "music/search", json!({})),
            correlator.submit(&sink, "music/search", json!({})),
            teardown
        );

        assert!(matches!(first, Err(AssistantError::Disconnected)));
        assert!(matches!(second, Err(AssistantError::Disconnected)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submit_clears_its_entry() {
        let correlator = Correlator::default();
        let (sink, _frames) = channel_sink();

        let abandoned = timeout(
            Duration::from_secs(1),
            correlator.submit(&sink, "music/search", json!({})),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(correlator.pending_count(), 0);
    }
}
