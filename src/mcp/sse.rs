//! MCP SSE Transport
//!
//! Classic HTTP+SSE transport: GET `/sse` opens the stream and announces
//! the message endpoint; POST `/message?sessionId=…` submits JSON-RPC
//! requests whose responses are delivered over the stream. List-changed
//! notifications fan out to every open stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

/// Outbound channel capacity per session. A slow consumer drops the
/// oldest unsent messages rather than blocking the server.
const SESSION_CHANNEL_CAPACITY: usize = 32;

/// SSE heartbeat interval.
const HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Registry of open SSE sessions.
#[derive(Default)]
pub struct SseSessionManager {
    sessions: Mutex<HashMap<Uuid, mpsc::Sender<Value>>>,
}

impl SseSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (Uuid, mpsc::Receiver<Value>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let session_id = Uuid::new_v4();
        self.sessions.lock().unwrap().insert(session_id, sender);
        (session_id, receiver)
    }

    pub fn unregister(&self, session_id: &Uuid) {
        self.sessions.lock().unwrap().remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Deliver a message to one session. Returns false when the session is
    /// unknown or its stream has gone away.
    pub fn send_to(&self, session_id: &Uuid, message: Value) -> bool {
        let sender = self.sessions.lock().unwrap().get(session_id).cloned();
        match sender {
            Some(sender) => sender.try_send(message).is_ok(),
            None => false,
        }
    }

    /// Deliver a message to every open session.
    pub fn broadcast(&self, message: &Value) {
        let senders: Vec<mpsc::Sender<Value>> =
            self.sessions.lock().unwrap().values().cloned().collect();
        for sender in senders {
            let _ = sender.try_send(message.clone());
        }
    }
}

/// Stream wrapper unregistering the session when the client disconnects.
struct CleanupStream<S> {
    inner: S,
    manager: std::sync::Arc<SseSessionManager>,
    session_id: Uuid,
}

impl<S: Stream + Unpin> Stream for CleanupStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        info!(session_id = %self.session_id, "SSE connection closed, cleaning up");
        self.manager.unregister(&self.session_id);
    }
}

/// Build the SSE response for a new session: an `endpoint` event naming
/// the message endpoint, followed by `message` events as responses and
/// notifications arrive.
pub fn sse_response(
    manager: std::sync::Arc<SseSessionManager>,
    base_url: &str,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (session_id, receiver) = manager.register();

    debug!(session_id = %session_id, open_sessions = manager.session_count(), "SSE session registered");

    let endpoint =
        format!("{}/message?sessionId={}", base_url.trim_end_matches('/'), session_id);
    let endpoint_event = Ok(Event::default().event("endpoint").data(endpoint));

    let message_stream = ReceiverStream::new(receiver).map(|message| {
        Ok(Event::default()
            .event("message")
            .data(serde_json::to_string(&message).unwrap_or_else(|_| "{}".to_string())))
    });

    let stream = tokio_stream::once(endpoint_event).chain(message_stream);
    let stream = CleanupStream { inner: Box::pin(stream), manager, session_id };

    Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)).text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let manager = SseSessionManager::new();
        let (id, _receiver) = manager.register();
        assert_eq!(manager.session_count(), 1);

        manager.unregister(&id);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_session() {
        let manager = SseSessionManager::new();
        let (id, mut receiver) = manager.register();

        assert!(manager.send_to(&id, serde_json::json!({"method": "x"})));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received["method"], "x");

        assert!(!manager.send_to(&Uuid::new_v4(), serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_sessions() {
        let manager = SseSessionManager::new();
        let (_id1, mut rx1) = manager.register();
        let (_id2, mut rx2) = manager.register();

        manager.broadcast(&serde_json::json!({"method": "notifications/tools/list_changed"}));

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
