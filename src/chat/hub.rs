//! Per-conversation broadcast topics.
//!
//! Fan-out only: there is no replay. A subscriber that lags or disconnects
//! recovers by re-fetching the conversation over the REST API.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::chat::model::ChatEvent;

const TOPIC_CAPACITY: usize = 64;

/// Registry of per-conversation broadcast channels.
pub struct ChatHub {
    topics: Mutex<HashMap<Uuid, broadcast::Sender<ChatEvent>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to one conversation's events, creating the topic on demand.
    pub fn subscribe(&self, conversation_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a conversation's topic. A topic with no
    /// subscribers silently drops the event.
    pub fn publish(&self, conversation_id: Uuid, event: ChatEvent) {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = topics.get(&conversation_id) {
            let _ = tx.send(event);
        }
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = ChatHub::new();
        let convo = Uuid::new_v4();
        let mut rx = hub.subscribe(convo);

        hub.publish(convo, ChatEvent::ConversationResolved { conversation_id: convo });
        match rx.recv().await.unwrap() {
            ChatEvent::ConversationResolved { conversation_id } => {
                assert_eq!(conversation_id, convo)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn topics_are_isolated_per_conversation() {
        let hub = ChatHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.subscribe(a);
        let _rx_b = hub.subscribe(b);

        hub.publish(b, ChatEvent::ConversationResolved { conversation_id: b });
        assert!(matches!(
            rx_a.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let hub = ChatHub::new();
        let convo = Uuid::new_v4();
        hub.publish(convo, ChatEvent::ConversationResolved { conversation_id: convo });
    }
}
