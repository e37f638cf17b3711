use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::db::models::Message;

const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    NewMessage { message: Message },
}

/// Per-user fanout for live sessions. The `messages` table is the source
/// of truth; delivery here is best effort, unacknowledged, not retried.
#[derive(Clone, Default)]
pub struct MessageRelay {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<RelayEvent>>>>,
}

impl MessageRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: &str) -> broadcast::Receiver<RelayEvent> {
        let mut topics = self.topics.write().await;
        topics
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// The only way the rest of the system can reach a live session.
    pub async fn publish(&self, user_id: &str, event: RelayEvent) {
        let topics = self.topics.read().await;
        if let Some(sender) = topics.get(user_id) {
            let _ = sender.send(event);
        }
    }

    /// Drops the topic once the user's last session is gone.
    pub async fn disconnect(&self, user_id: &str) {
        let mut topics = self.topics.write().await;
        if let Some(sender) = topics.get(user_id) {
            if sender.receiver_count() == 0 {
                topics.remove(user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample_message(content: &str) -> Message {
        Message {
            id: "m1".to_string(),
            sender_id: "sender".to_string(),
            receiver_id: "receiver".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let relay = MessageRelay::new();
        let mut rx = relay.subscribe("receiver").await;

        relay
            .publish(
                "receiver",
                RelayEvent::NewMessage {
                    message: sample_message("hello"),
                },
            )
            .await;

        let RelayEvent::NewMessage { message } = rx.recv().await.unwrap();
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_a_noop() {
        let relay = MessageRelay::new();
        relay
            .publish(
                "nobody",
                RelayEvent::NewMessage {
                    message: sample_message("dropped"),
                },
            )
            .await;

        assert!(relay.topics.read().await.is_empty());
    }

    #[tokio::test]
    async fn topics_are_isolated_per_user() {
        let relay = MessageRelay::new();
        let mut for_a = relay.subscribe("a").await;
        let mut for_b = relay.subscribe("b").await;

        relay
            .publish(
                "a",
                RelayEvent::NewMessage {
                    message: sample_message("for a"),
                },
            )
            .await;

        let RelayEvent::NewMessage { message } = for_a.recv().await.unwrap();
        assert_eq!(message.content, "for a");
        assert!(for_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_removes_idle_topic() {
        let relay = MessageRelay::new();
        let rx = relay.subscribe("receiver").await;

        // Still one live receiver, topic must stay
        relay.disconnect("receiver").await;
        assert_eq!(relay.topics.read().await.len(), 1);

        drop(rx);
        relay.disconnect("receiver").await;
        assert!(relay.topics.read().await.is_empty());
    }
}
