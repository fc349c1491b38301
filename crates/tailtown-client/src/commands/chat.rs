use serde::Serialize;
use tailtown_store::{ChatSession, Message};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::chat;
use crate::error::ClientError;
use crate::events::{emit_event, ChatErrorPayload, ChatEvent, ChatMessagesPayload};
use crate::state::ClientState;
use crate::subscription::Subscription;

const UNKNOWN_USER: &str = "Unknown User";
const NO_MESSAGES: &str = "No messages yet";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: String,
    pub is_read: bool,
    /// Whether the local user sent it.
    pub sent: bool,
}

impl MessageDto {
    pub fn from_message(m: Message, local_uid: &str) -> Self {
        Self {
            sent: m.sender_id == local_uid,
            id: m.id,
            chat_id: m.chat_id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            text: m.text,
            timestamp: m.timestamp.to_rfc3339(),
            is_read: m.is_read,
        }
    }
}

/// One row of the conversation list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub chat_id: String,
    pub other_user_id: Option<String>,
    pub other_name: String,
    pub preview: String,
    pub last_message_at: Option<String>,
}

impl ConversationDto {
    pub fn from_session(session: &ChatSession, local_uid: &str, preview_len: usize) -> Self {
        let other = session.counterpart_of(local_uid);
        let other_name = other
            .and_then(|id| session.participant_info.get(id))
            .map(|info| info.name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USER)
            .to_string();
        let preview = match session.last_message {
            Some(ref last) if !last.text.is_empty() => truncate_preview(&last.text, preview_len),
            _ => NO_MESSAGES.to_string(),
        };
        Self {
            chat_id: session.id.clone(),
            other_user_id: other.map(str::to_string),
            other_name,
            preview,
            last_message_at: session.last_message_timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

/// Shorten `text` to at most `max` characters, ending in "..." when cut.
fn truncate_preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// The signed-in user's conversations, most recently active first.
pub async fn list_conversations(state: &ClientState) -> Result<Vec<ConversationDto>, ClientError> {
    let user = state.session.require_user()?;
    let sessions = chat::list_sessions_for(&state.backend, &user.uid).await?;
    Ok(sessions
        .iter()
        .map(|s| ConversationDto::from_session(s, &user.uid, state.config.preview_len))
        .collect())
}

struct OpenChat {
    session: ChatSession,
    counterpart: String,
    subscription: Subscription,
}

/// A chat pane.  Holds at most one live subscription and forwards its
/// snapshots to `sink` as [`ChatEvent`]s.
pub struct ChatView {
    backend: Backend,
    local_uid: String,
    sink: mpsc::UnboundedSender<ChatEvent>,
    open: Option<OpenChat>,
}

impl ChatView {
    pub fn new(
        backend: Backend,
        local_uid: impl Into<String>,
        sink: mpsc::UnboundedSender<ChatEvent>,
    ) -> Self {
        Self {
            backend,
            local_uid: local_uid.into(),
            sink,
            open: None,
        }
    }

    pub fn local_uid(&self) -> &str {
        &self.local_uid
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.session.id.as_str())
    }

    /// "Chat with <name>" for the open chat.
    pub fn title(&self) -> Option<String> {
        let open = self.open.as_ref()?;
        let name = open
            .session
            .participant_info
            .get(&open.counterpart)
            .map(|i| i.name.as_str())
            .filter(|n| !n.trim().is_empty());
        Some(match name {
            Some(name) => format!("Chat with {name}"),
            None => "Chat".to_string(),
        })
    }

    /// Show `session`, replacing whatever chat was open.  The previous
    /// subscription is cancelled before the new one starts.
    pub fn open(&mut self, session: ChatSession) -> Result<(), ClientError> {
        let counterpart = session
            .counterpart_of(&self.local_uid)
            .map(str::to_string)
            .ok_or_else(|| ClientError::invalid("Could not determine recipient for this chat"))?;

        self.close();

        let local = self.local_uid.clone();
        let updates = self.sink.clone();
        let errors = self.sink.clone();
        let chat_id = session.id.clone();
        let error_chat = session.id.clone();

        let subscription = chat::subscribe_messages(
            &self.backend,
            &session.id,
            move |messages| {
                let messages = messages
                    .into_iter()
                    .map(|m| MessageDto::from_message(m, &local))
                    .collect();
                emit_event(
                    &updates,
                    ChatEvent::ChatMessages(ChatMessagesPayload {
                        chat_id: chat_id.clone(),
                        messages,
                    }),
                );
            },
            move |e| {
                emit_event(
                    &errors,
                    ChatEvent::ChatError(ChatErrorPayload {
                        chat_id: error_chat.clone(),
                        message: format!("Failed to load messages: {e}"),
                    }),
                );
            },
        );

        info!(chat_id = %session.id, "chat opened");
        self.open = Some(OpenChat {
            session,
            counterpart,
            subscription,
        });
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(previous) = self.open.take() {
            previous.subscription.unsubscribe();
            debug!(chat_id = %previous.session.id, "chat closed");
        }
    }

    /// Send `text` to the other participant of the open chat.
    pub async fn send(&self, text: &str) -> Result<MessageDto, ClientError> {
        let open = self
            .open
            .as_ref()
            .ok_or_else(|| ClientError::invalid("No chat is open"))?;
        let message = chat::send_message(
            &self.backend,
            &open.session.id,
            &self.local_uid,
            &open.counterpart,
            text,
        )
        .await?;
        Ok(MessageDto::from_message(message, &self.local_uid))
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the conversation with `chat_id` from the signed-in user's list.
pub async fn find_conversation(
    state: &ClientState,
    chat_id: &str,
) -> Result<ChatSession, ClientError> {
    let user = state.session.require_user()?;
    let id = chat_id.trim().to_string();
    if id.is_empty() {
        return Err(ClientError::invalid("Chat id is required"));
    }
    let lookup = id.clone();
    let session = state
        .backend
        .call(move |db| db.get_chat_session(&lookup))
        .await
        .map_err(|e| e.with_not_found(format!("Chat {id} not found")))?;
    if !session.has_participant(&user.uid) {
        return Err(ClientError::PermissionDenied(
            "only participants may open a chat".to_string(),
        ));
    }
    Ok(session)
}
