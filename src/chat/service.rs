//! Conversation state machine.
//!
//! All mutations are whole-document read-modify-write against the store
//! (last write wins), with events published to the hub after a successful
//! write. Typing state is ephemeral and lives only in this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::chat::hub::ChatHub;
use crate::chat::model::{
    AssignmentEpisode, ChatEvent, ChatMessage, Conversation, ConversationSummary,
};
use crate::error::ApiError;
use crate::store::Database;

/// Priority score for the staff conversation list.
///
/// 5 — unassigned with unread; 4 — assigned to the viewer with unread;
/// 3 — assigned to the viewer, all read; 2 — assigned elsewhere with
/// unread; 1 — everything else.
pub fn score_for(summary: &ConversationSummary, viewer: Uuid) -> u8 {
    let unread = summary
        .messages
        .iter()
        .any(|m| m.sender_id != Some(viewer) && !m.seen_by.contains(&viewer));
    match (summary.assigned_employee_id, unread) {
        (None, true) => 5,
        (Some(assignee), true) if assignee == viewer => 4,
        (Some(assignee), false) if assignee == viewer => 3,
        (Some(_), true) => 2,
        _ => 1,
    }
}

pub struct ConversationService {
    store: Arc<dyn Database>,
    hub: Arc<ChatHub>,
    /// (conversation, user) → currently typing. Last writer wins.
    typing: Mutex<HashMap<(Uuid, Uuid), bool>>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Database>, hub: Arc<ChatHub>) -> Self {
        Self {
            store,
            hub,
            typing: Mutex::new(HashMap::new()),
        }
    }

    /// The client's single conversation, created on first access.
    /// Idempotent: a concurrent create loses to the existing row and the
    /// winner is re-read.
    pub async fn get_or_create(&self, client_id: Uuid) -> Result<Conversation, ApiError> {
        if let Some(existing) = self.store.get_conversation_by_client(client_id).await? {
            return Ok(existing);
        }
        let fresh = Conversation::new(client_id);
        self.store.insert_conversation_if_absent(&fresh).await?;
        let convo = self
            .store
            .get_conversation_by_client(client_id)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "conversation",
                id: client_id.to_string(),
            })?;
        if convo.id == fresh.id {
            info!(conversation_id = %convo.id, client_id = %client_id, "Conversation created");
        }
        Ok(convo)
    }

    /// Fetch by conversation id; 404 when absent.
    pub async fn get(&self, conversation_id: Uuid) -> Result<Conversation, ApiError> {
        self.load(conversation_id).await
    }

    async fn load(&self, conversation_id: Uuid) -> Result<Conversation, ApiError> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })
    }

    async fn save(&self, convo: &mut Conversation) -> Result<(), ApiError> {
        convo.updated_at = Utc::now();
        self.store.put_conversation(convo).await?;
        Ok(())
    }

    /// Append a message. Any message — user or system — reopens a resolved
    /// conversation.
    pub async fn post_message(
        &self,
        conversation_id: Uuid,
        message: ChatMessage,
    ) -> Result<ChatMessage, ApiError> {
        let mut convo = self.load(conversation_id).await?;
        convo.messages.push(message.clone());
        convo.is_resolved = false;
        self.save(&mut convo).await?;
        self.hub.publish(
            conversation_id,
            ChatEvent::MessagePosted {
                conversation_id,
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Mark every message not authored by `viewer` as seen by them.
    /// The author never appears in their own message's seen set.
    pub async fn mark_seen(&self, conversation_id: Uuid, viewer: Uuid) -> Result<(), ApiError> {
        let mut convo = self.load(conversation_id).await?;
        let mut changed = false;
        for message in &mut convo.messages {
            if message.sender_id != Some(viewer) && message.seen_by.insert(viewer) {
                changed = true;
            }
        }
        if changed {
            self.save(&mut convo).await?;
            self.hub.publish(
                conversation_id,
                ChatEvent::SeenChanged {
                    conversation_id,
                    user_id: viewer,
                },
            );
        }
        Ok(())
    }

    /// Ephemeral typing flag. Never persisted; other processes never see it.
    pub fn set_typing(&self, conversation_id: Uuid, user_id: Uuid, is_typing: bool) {
        {
            let mut typing = self.typing.lock().unwrap_or_else(|e| e.into_inner());
            if is_typing {
                typing.insert((conversation_id, user_id), true);
            } else {
                typing.remove(&(conversation_id, user_id));
            }
        }
        self.hub.publish(
            conversation_id,
            ChatEvent::TypingChanged {
                conversation_id,
                user_id,
                is_typing,
            },
        );
    }

    /// Users currently typing in a conversation.
    pub fn typing_in(&self, conversation_id: Uuid) -> Vec<Uuid> {
        let typing = self.typing.lock().unwrap_or_else(|e| e.into_inner());
        typing
            .keys()
            .filter(|(c, _)| *c == conversation_id)
            .map(|(_, u)| *u)
            .collect()
    }

    /// Assign an employee. Opens a new assignment episode; a previous
    /// episode left open stays open. Announces the connection with a system
    /// message, which also reopens the conversation.
    pub async fn assign(
        &self,
        conversation_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Conversation, ApiError> {
        let mut convo = self.load(conversation_id).await?;
        convo.assigned_employee_id = Some(employee_id);
        convo.history.push(AssignmentEpisode {
            employee_id,
            started_at: Utc::now(),
            completed_at: None,
            reason: None,
        });

        let display_name = match self.store.get_user(employee_id).await? {
            Some(user) => user.name,
            None => "a team member".to_string(),
        };
        let announcement = ChatMessage::system(format!("You are now connected with {display_name}"));
        convo.messages.push(announcement.clone());
        convo.is_resolved = false;
        self.save(&mut convo).await?;

        self.hub.publish(
            conversation_id,
            ChatEvent::AssignmentChanged {
                conversation_id,
                assigned_employee_id: Some(employee_id),
            },
        );
        self.hub.publish(
            conversation_id,
            ChatEvent::MessagePosted {
                conversation_id,
                message: announcement,
            },
        );
        info!(conversation_id = %conversation_id, employee_id = %employee_id, "Conversation assigned");
        Ok(convo)
    }

    /// Clear the assignee. The current episode is left open.
    pub async fn unassign(&self, conversation_id: Uuid) -> Result<Conversation, ApiError> {
        let mut convo = self.load(conversation_id).await?;
        convo.assigned_employee_id = None;

        let announcement = ChatMessage::system("You have been returned to the queue");
        convo.messages.push(announcement.clone());
        convo.is_resolved = false;
        self.save(&mut convo).await?;

        self.hub.publish(
            conversation_id,
            ChatEvent::AssignmentChanged {
                conversation_id,
                assigned_employee_id: None,
            },
        );
        self.hub.publish(
            conversation_id,
            ChatEvent::MessagePosted {
                conversation_id,
                message: announcement,
            },
        );
        Ok(convo)
    }

    /// Resolve the conversation. Stamps completion on the LAST episode,
    /// overwriting an earlier stamp if the episode was already closed.
    pub async fn complete(
        &self,
        conversation_id: Uuid,
        reason: Option<String>,
    ) -> Result<Conversation, ApiError> {
        let mut convo = self.load(conversation_id).await?;
        let now = Utc::now();
        let reason = reason.unwrap_or_else(|| "Completed".to_string());

        if let Some(episode) = convo.history.last_mut() {
            episode.completed_at = Some(now);
            episode.reason = Some(reason.clone());
        }
        let announcement = ChatMessage::system(format!("Conversation completed: {reason}"));
        convo.messages.push(announcement.clone());
        convo.is_resolved = true;
        self.save(&mut convo).await?;

        self.hub.publish(
            conversation_id,
            ChatEvent::MessagePosted {
                conversation_id,
                message: announcement,
            },
        );
        self.hub
            .publish(conversation_id, ChatEvent::ConversationResolved { conversation_id });
        info!(conversation_id = %conversation_id, "Conversation resolved");
        Ok(convo)
    }

    /// Slim projection over every conversation, for the staff listing,
    /// sorted by priority score then recency for `viewer`.
    pub async fn find_all_for(
        &self,
        viewer: Uuid,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        let mut summaries = self.store.list_conversation_summaries().await?;
        summaries.sort_by(|a, b| {
            score_for(b, viewer)
                .cmp(&score_for(a, viewer))
                .then_with(|| {
                    let last = |s: &ConversationSummary| s.messages.last().map(|m| m.timestamp);
                    last(b).cmp(&last(a))
                })
        });
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn service() -> ConversationService {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        ConversationService::new(store, Arc::new(ChatHub::new()))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let svc = service().await;
        let client = Uuid::new_v4();
        let first = svc.get_or_create(client).await.unwrap();
        let second = svc.get_or_create(client).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.is_resolved);
        assert!(first.assigned_employee_id.is_none());
    }

    #[tokio::test]
    async fn posting_reopens_resolved_conversation() {
        let svc = service().await;
        let client = Uuid::new_v4();
        let convo = svc.get_or_create(client).await.unwrap();

        svc.complete(convo.id, None).await.unwrap();
        let resolved = svc.get_or_create(client).await.unwrap();
        assert!(resolved.is_resolved);

        svc.post_message(convo.id, ChatMessage::system("ping"))
            .await
            .unwrap();
        let reopened = svc.get_or_create(client).await.unwrap();
        assert!(!reopened.is_resolved);
    }

    #[tokio::test]
    async fn mark_seen_skips_own_messages() {
        let svc = service().await;
        let client = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let convo = svc.get_or_create(client).await.unwrap();

        svc.post_message(convo.id, ChatMessage::user(client, "hello"))
            .await
            .unwrap();
        svc.post_message(convo.id, ChatMessage::user(employee, "hi there"))
            .await
            .unwrap();

        svc.mark_seen(convo.id, client).await.unwrap();
        let after = svc.get_or_create(client).await.unwrap();
        // Client saw the employee's message; their own seen set stays empty.
        assert!(!after.messages[0].seen_by.contains(&client));
        assert!(after.messages[1].seen_by.contains(&client));
    }

    #[tokio::test]
    async fn assign_over_assign_leaves_dangling_episode() {
        let svc = service().await;
        let client = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let convo = svc.get_or_create(client).await.unwrap();

        svc.assign(convo.id, first).await.unwrap();
        let after = svc.assign(convo.id, second).await.unwrap();

        assert_eq!(after.assigned_employee_id, Some(second));
        assert_eq!(after.history.len(), 2);
        // The first episode was never closed.
        assert!(after.history[0].completed_at.is_none());
    }

    #[tokio::test]
    async fn complete_stamps_last_episode_even_if_closed() {
        let svc = service().await;
        let client = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let convo = svc.get_or_create(client).await.unwrap();

        svc.assign(convo.id, employee).await.unwrap();
        svc.complete(convo.id, Some("First pass".into())).await.unwrap();
        let after = svc.complete(convo.id, None).await.unwrap();

        assert!(after.is_resolved);
        assert_eq!(after.history.len(), 1);
        assert_eq!(after.history[0].reason.as_deref(), Some("Completed"));
    }

    #[tokio::test]
    async fn scoring_orders_staff_view() {
        let svc = service().await;
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        // Unassigned with an unread message → 5.
        let loud = svc.get_or_create(Uuid::new_v4()).await.unwrap();
        svc.post_message(loud.id, ChatMessage::user(loud.client_id, "help"))
            .await
            .unwrap();

        // Assigned to someone else, nothing unread for the viewer → 1 once
        // seen. Leave unread → 2.
        let quiet = svc.get_or_create(Uuid::new_v4()).await.unwrap();
        svc.assign(quiet.id, other).await.unwrap();
        svc.mark_seen(quiet.id, viewer).await.unwrap();

        let listed = svc.find_all_for(viewer).await.unwrap();
        assert_eq!(listed[0].id, loud.id);
        assert_eq!(score_for(&listed[0], viewer), 5);
    }

    #[tokio::test]
    async fn typing_is_last_writer_wins_and_clearable() {
        let svc = service().await;
        let convo = Uuid::new_v4();
        let user = Uuid::new_v4();

        svc.set_typing(convo, user, true);
        assert_eq!(svc.typing_in(convo), vec![user]);
        svc.set_typing(convo, user, false);
        assert!(svc.typing_in(convo).is_empty());
    }
}
