//! Best-effort fan-out of list-changed and resource-updated notifications.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use capstan::SubscriptionManager;

use crate::types::{JsonRpcNotification, ListKind, RESOURCE_UPDATED};

use super::sender::NotificationSender;

/// Pushes notifications to whatever sender the transport installed.
///
/// With no sender every notification is dropped silently. Send failures are
/// logged and absorbed; they never reach the caller.
pub struct NotificationManager {
    sender: RwLock<Option<Arc<dyn NotificationSender>>>,
    subscriptions: Arc<Mutex<SubscriptionManager>>,
}

impl NotificationManager {
    pub fn new(subscriptions: Arc<Mutex<SubscriptionManager>>) -> Self {
        Self {
            sender: RwLock::new(None),
            subscriptions,
        }
    }

    pub async fn set_sender(&self, sender: Arc<dyn NotificationSender>) {
        *self.sender.write().await = Some(sender);
    }

    pub async fn clear_sender(&self) {
        *self.sender.write().await = None;
    }

    pub async fn has_sender(&self) -> bool {
        self.sender.read().await.is_some()
    }

    /// Tell every subscriber of `uri` that it changed. Returns how many
    /// notifications were delivered.
    pub async fn notify_resource_update(&self, uri: &str) -> usize {
        let Some(sender) = self.current_sender().await else {
            tracing::debug!("No notification sender; dropping update for {uri}");
            return 0;
        };

        let subscribers = self.subscriptions.lock().await.subscribers(uri);
        if subscribers.is_empty() {
            tracing::debug!("No subscribers for {uri}");
            return 0;
        }

        let notification =
            JsonRpcNotification::new(RESOURCE_UPDATED, Some(json!({ "uri": uri })));

        let mut delivered = 0;
        for client in &subscribers {
            match sender
                .send_notification(Some(client.as_str()), notification.clone())
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Failed to notify {client} about {uri}: {e}"),
            }
        }
        delivered
    }

    /// Broadcast that a listing changed. Returns whether it was delivered.
    pub async fn notify_list_changed(&self, list: ListKind) -> bool {
        let Some(sender) = self.current_sender().await else {
            tracing::debug!("No notification sender; dropping {}", list.method());
            return false;
        };

        let notification = JsonRpcNotification::new(list.method(), None);
        match sender.send_notification(None, notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send {}: {e}", list.method());
                false
            }
        }
    }

    async fn current_sender(&self) -> Option<Arc<dyn NotificationSender>> {
        self.sender.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelSender;
    use crate::types::{McpError, McpResult, RESOURCES_LIST_CHANGED};
    use async_trait::async_trait;

    struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        async fn send_notification(
            &self,
            _target: Option<&str>,
            _notification: JsonRpcNotification,
        ) -> McpResult<()> {
            Err(McpError::Transport("wire cut".to_string()))
        }
    }

    fn manager() -> (NotificationManager, Arc<Mutex<SubscriptionManager>>) {
        let subs = Arc::new(Mutex::new(SubscriptionManager::new()));
        (NotificationManager::new(subs.clone()), subs)
    }

    #[tokio::test]
    async fn test_without_sender_is_silent() {
        let (notifier, subs) = manager();
        subs.lock().await.subscribe("c1", "r1").unwrap();
        assert_eq!(notifier.notify_resource_update("r1").await, 0);
        assert!(!notifier.notify_list_changed(ListKind::Tools).await);
    }

    #[tokio::test]
    async fn test_update_fans_out_to_subscribers() {
        let (notifier, subs) = manager();
        let (sender, mut rx) = ChannelSender::channel();
        notifier.set_sender(Arc::new(sender)).await;
        {
            let mut subs = subs.lock().await;
            subs.subscribe("c1", "r1").unwrap();
            subs.subscribe("c2", "r1").unwrap();
            subs.subscribe("c3", "r2").unwrap();
        }

        assert_eq!(notifier.notify_resource_update("r1").await, 2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.target.as_deref(), Some("c1"));
        assert_eq!(second.target.as_deref(), Some("c2"));
        assert_eq!(first.notification.method, RESOURCE_UPDATED);
        assert_eq!(first.notification.params, Some(json!({ "uri": "r1" })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_list_changed_is_broadcast() {
        let (notifier, _) = manager();
        let (sender, mut rx) = ChannelSender::channel();
        notifier.set_sender(Arc::new(sender)).await;
        assert!(notifier.notify_list_changed(ListKind::Resources).await);
        let out = rx.recv().await.unwrap();
        assert!(out.target.is_none());
        assert_eq!(out.notification.method, RESOURCES_LIST_CHANGED);
    }

    #[tokio::test]
    async fn test_send_failures_are_absorbed() {
        let (notifier, subs) = manager();
        notifier.set_sender(Arc::new(FailingSender)).await;
        subs.lock().await.subscribe("c1", "r1").unwrap();
        assert_eq!(notifier.notify_resource_update("r1").await, 0);
        assert!(!notifier.notify_list_changed(ListKind::Prompts).await);

        notifier.clear_sender().await;
        assert!(!notifier.has_sender().await);
    }
}
