//! Conversation HTTP and WebSocket surface.
//!
//! REST carries the durable operations; `/ws/chat` is fan-out only. A
//! socket joins one conversation at a time and receives only that topic.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{can_access_conversation, Identity};
use crate::chat::hub::ChatHub;
use crate::chat::model::{ChatAction, ChatEvent, ChatMessage, Conversation, ConversationSummary};
use crate::chat::service::ConversationService;
use crate::error::ApiError;

#[derive(Clone)]
struct ChatState {
    service: Arc<ConversationService>,
    hub: Arc<ChatHub>,
}

pub fn chat_routes(service: Arc<ConversationService>, hub: Arc<ChatHub>) -> Router {
    Router::new()
        .route("/api/conversations/me", get(my_conversation))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(fetch_conversation))
        .route("/api/conversations/{id}/messages", post(post_message))
        .route("/api/conversations/{id}/seen", post(mark_seen))
        .route("/api/conversations/{id}/assign", post(assign))
        .route("/api/conversations/{id}/unassign", post(unassign))
        .route("/api/conversations/{id}/complete", post(complete))
        .route("/ws/chat", any(ws_handler))
        .with_state(ChatState { service, hub })
}

#[derive(Debug, Serialize)]
struct ConversationView {
    #[serde(flatten)]
    conversation: Conversation,
    /// Users currently typing (ephemeral, this process only).
    typing: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostBody {
    body: String,
    #[serde(default)]
    attachment_url: Option<String>,
    #[serde(default)]
    attachment_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody {
    /// Defaults to the caller.
    #[serde(default)]
    employee_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct CompleteBody {
    #[serde(default)]
    reason: Option<String>,
}

/// The caller's own conversation, created on first access.
async fn my_conversation(
    State(state): State<ChatState>,
    identity: Identity,
) -> Result<Json<ConversationView>, ApiError> {
    let conversation = state.service.get_or_create(identity.user_id).await?;
    let typing = state.service.typing_in(conversation.id);
    Ok(Json(ConversationView {
        conversation,
        typing,
    }))
}

/// Staff listing, sorted by priority score then recency.
async fn list_conversations(
    State(state): State<ChatState>,
    identity: Identity,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization(
            "Only staff can list conversations".into(),
        ));
    }
    Ok(Json(state.service.find_all_for(identity.user_id).await?))
}

async fn load_authorized(
    state: &ChatState,
    identity: &Identity,
    id: Uuid,
) -> Result<Conversation, ApiError> {
    let convo = state.service.get(id).await?;
    if !can_access_conversation(identity, convo.client_id) {
        return Err(ApiError::Authorization(
            "Not allowed to access this conversation".into(),
        ));
    }
    Ok(convo)
}

async fn fetch_conversation(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>, ApiError> {
    let conversation = load_authorized(&state, &identity, id).await?;
    let typing = state.service.typing_in(conversation.id);
    Ok(Json(ConversationView {
        conversation,
        typing,
    }))
}

async fn post_message(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<PostBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    if body.body.trim().is_empty() && body.attachment_url.is_none() {
        return Err(ApiError::Validation("message body is required".into()));
    }
    load_authorized(&state, &identity, id).await?;
    let mut message = ChatMessage::user(identity.user_id, body.body);
    if let (Some(url), Some(kind)) = (body.attachment_url, body.attachment_type) {
        message = message.with_attachment(url, kind);
    }
    let posted = state.service.post_message(id, message).await?;
    Ok(Json(posted))
}

async fn mark_seen(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_authorized(&state, &identity, id).await?;
    state.service.mark_seen(id, identity.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn assign(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Conversation>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization(
            "Only staff can assign conversations".into(),
        ));
    }
    let employee_id = body.employee_id.unwrap_or(identity.user_id);
    Ok(Json(state.service.assign(id, employee_id).await?))
}

async fn unassign(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization(
            "Only staff can unassign conversations".into(),
        ));
    }
    Ok(Json(state.service.unassign(id).await?))
}

async fn complete(
    State(state): State<ChatState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<Conversation>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization(
            "Only staff can complete conversations".into(),
        ));
    }
    Ok(Json(state.service.complete(id, body.reason).await?))
}

// ── WebSocket ───────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatState>,
    identity: Identity,
) -> impl IntoResponse {
    info!(user_id = %identity.user_id, "Chat client connecting");
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, identity))
}

async fn handle_chat_socket(mut socket: WebSocket, state: ChatState, identity: Identity) {
    // Joined conversation and its event subscription. Joining another
    // conversation replaces both.
    let mut joined: Option<Uuid> = None;
    let mut events: Option<broadcast::Receiver<ChatEvent>> = None;

    loop {
        tokio::select! {
            result = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Chat client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Chat client lagged behind broadcast");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Chat topic closed");
                        events = None;
                        joined = None;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ChatAction>(&text) {
                            Ok(action) => {
                                let reply = match handle_action(
                                    &state, &identity, action, &mut joined, &mut events,
                                ).await {
                                    Ok(reply) => reply,
                                    Err(e) => Some(serde_json::json!({
                                        "type": "error",
                                        "error": e.to_string(),
                                    })),
                                };
                                if let Some(payload) = reply {
                                    if socket
                                        .send(Message::Text(payload.to_string().into()))
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                debug!(error = %e, "Invalid JSON from chat client");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(user_id = %identity.user_id, "Chat client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Chat WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // A dropped socket stops typing.
    if let Some(conversation_id) = joined {
        state.service.set_typing(conversation_id, identity.user_id, false);
    }
}

/// Apply one client action. Join answers with an ack frame so the client
/// knows its subscription is live; other actions answer through the topic.
async fn handle_action(
    state: &ChatState,
    identity: &Identity,
    action: ChatAction,
    joined: &mut Option<Uuid>,
    events: &mut Option<broadcast::Receiver<ChatEvent>>,
) -> Result<Option<serde_json::Value>, ApiError> {
    match action {
        ChatAction::Join { conversation_id } => {
            load_authorized(state, identity, conversation_id).await?;
            *joined = Some(conversation_id);
            *events = Some(state.hub.subscribe(conversation_id));
            Ok(Some(serde_json::json!({
                "type": "joined",
                "conversation_id": conversation_id,
            })))
        }
        ChatAction::Message {
            conversation_id,
            body,
        } => {
            if *joined != Some(conversation_id) {
                return Err(ApiError::Validation("join the conversation first".into()));
            }
            if body.trim().is_empty() {
                return Ok(None);
            }
            state
                .service
                .post_message(conversation_id, ChatMessage::user(identity.user_id, body))
                .await?;
            Ok(None)
        }
        ChatAction::Typing {
            conversation_id,
            is_typing,
        } => {
            if *joined != Some(conversation_id) {
                return Err(ApiError::Validation("join the conversation first".into()));
            }
            state
                .service
                .set_typing(conversation_id, identity.user_id, is_typing);
            Ok(None)
        }
        ChatAction::Seen { conversation_id } => {
            if *joined != Some(conversation_id) {
                return Err(ApiError::Validation("join the conversation first".into()));
            }
            state.service.mark_seen(conversation_id, identity.user_id).await?;
            Ok(None)
        }
    }
}
