//! Outbound notification sink supplied by the transport.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{JsonRpcNotification, McpError, McpResult};

/// Delivers notifications to connected clients.
///
/// `target` is `None` for broadcasts and `Some(client_id)` for notifications
/// meant for a single subscriber.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_notification(
        &self,
        target: Option<&str>,
        notification: JsonRpcNotification,
    ) -> McpResult<()>;
}

/// A notification queued for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Option<String>,
    pub notification: JsonRpcNotification,
}

/// Sender backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelSender {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl NotificationSender for ChannelSender {
    async fn send_notification(
        &self,
        target: Option<&str>,
        notification: JsonRpcNotification,
    ) -> McpResult<()> {
        self.tx
            .send(Outbound {
                target: target.map(str::to_string),
                notification,
            })
            .map_err(|_| McpError::Transport("notification channel closed".to_string()))
    }
}
