//! MCP Notification Types
//!
//! List-changed notifications emitted when reconciliation alters the
//! advertised catalog, fanned out to connected sessions over a broadcast
//! channel.

use serde::Serialize;
use tokio::sync::broadcast;

pub const TOOLS_LIST_CHANGED_METHOD: &str = "notifications/tools/list_changed";
pub const PROMPTS_LIST_CHANGED_METHOD: &str = "notifications/prompts/list_changed";

/// A server-initiated JSON-RPC notification (no id, no response).
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
}

impl Notification {
    fn new(method: &str) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.to_string() }
    }

    pub fn tools_list_changed() -> Self {
        Self::new(TOOLS_LIST_CHANGED_METHOD)
    }

    pub fn prompts_list_changed() -> Self {
        Self::new(PROMPTS_LIST_CHANGED_METHOD)
    }
}

/// Fan-out channel delivering notifications to every connected session.
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Send to all current subscribers. Having no subscribers is not an
    /// error.
    pub fn send(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
