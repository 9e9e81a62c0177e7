//! Conversation data model and WebSocket event types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    /// None signals a system-generated message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    pub body: String,
    pub is_system: bool,
    /// Users who have seen this message. Never contains the sender.
    #[serde(default)]
    pub seen_by: BTreeSet<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(sender_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: Some(sender_id),
            body: body.into(),
            is_system: false,
            seen_by: BTreeSet::new(),
            attachment_url: None,
            attachment_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: None,
            body: body.into(),
            is_system: true,
            seen_by: BTreeSet::new(),
            attachment_url: None,
            attachment_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_attachment(mut self, url: impl Into<String>, kind: impl Into<String>) -> Self {
        self.attachment_url = Some(url.into());
        self.attachment_type = Some(kind.into());
        self
    }
}

/// One continuous period during which a specific employee was assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEpisode {
    pub employee_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The per-client conversation document. Exactly one per client; every
/// mutation is a whole-document read-modify-write at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee_id: Option<Uuid>,
    pub is_resolved: bool,
    /// Assignment episodes, append-only.
    #[serde(default)]
    pub history: Vec<AssignmentEpisode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// A brand-new conversation always starts Unassigned ∧ Open.
    pub fn new(client_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            messages: Vec::new(),
            assigned_employee_id: None,
            is_resolved: false,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Timestamp of the most recent message, if any.
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Whether `viewer` has any unseen message not authored by them.
    pub fn has_unread_for(&self, viewer: Uuid) -> bool {
        self.messages
            .iter()
            .any(|m| m.sender_id != Some(viewer) && !m.seen_by.contains(&viewer))
    }
}

/// Slim projection returned by the staff listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(convo: &Conversation) -> Self {
        Self {
            id: convo.id,
            client_id: convo.client_id,
            assigned_employee_id: convo.assigned_employee_id,
            messages: convo.messages.clone(),
        }
    }
}

/// Events fanned out to WebSocket subscribers of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessagePosted {
        conversation_id: Uuid,
        message: ChatMessage,
    },
    TypingChanged {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    SeenChanged {
        conversation_id: Uuid,
        user_id: Uuid,
    },
    AssignmentChanged {
        conversation_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned_employee_id: Option<Uuid>,
    },
    ConversationResolved {
        conversation_id: Uuid,
    },
}

/// Actions a WebSocket client can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatAction {
    /// Subscribe to a conversation's events.
    Join { conversation_id: Uuid },
    /// Post a message to a joined conversation.
    Message {
        conversation_id: Uuid,
        body: String,
    },
    /// Report typing state.
    Typing {
        conversation_id: Uuid,
        is_typing: bool,
    },
    /// Mark everything not authored by the caller as seen.
    Seen { conversation_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_is_unassigned_and_open() {
        let convo = Conversation::new(Uuid::new_v4());
        assert!(convo.assigned_employee_id.is_none());
        assert!(!convo.is_resolved);
        assert!(convo.messages.is_empty());
        assert!(convo.history.is_empty());
    }

    #[test]
    fn system_message_has_no_sender() {
        let msg = ChatMessage::system("Agent connected");
        assert!(msg.sender_id.is_none());
        assert!(msg.is_system);
    }

    #[test]
    fn unread_ignores_own_messages() {
        let viewer = Uuid::new_v4();
        let mut convo = Conversation::new(Uuid::new_v4());
        convo.messages.push(ChatMessage::user(viewer, "hi"));
        assert!(!convo.has_unread_for(viewer));

        convo.messages.push(ChatMessage::user(Uuid::new_v4(), "hello"));
        assert!(convo.has_unread_for(viewer));
    }

    #[test]
    fn chat_event_serde_snake_case() {
        let event = ChatEvent::TypingChanged {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            is_typing: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"typing_changed\""));
    }

    #[test]
    fn chat_action_join_serde() {
        let id = Uuid::new_v4();
        let json = format!("{{\"action\":\"join\",\"conversation_id\":\"{id}\"}}");
        match serde_json::from_str::<ChatAction>(&json).unwrap() {
            ChatAction::Join { conversation_id } => assert_eq!(conversation_id, id),
            _ => panic!("Expected Join"),
        }
    }
}
