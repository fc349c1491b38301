use serde::Serialize;
use tokio::sync::mpsc;

use crate::commands::chat::MessageDto;

pub const EVENT_CHAT_MESSAGES: &str = "chat-messages";
pub const EVENT_CHAT_ERROR: &str = "chat-error";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagesPayload {
    pub chat_id: String,
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatErrorPayload {
    pub chat_id: String,
    pub message: String,
}

/// Updates pushed from an open chat to whoever renders it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ChatEvent {
    ChatMessages(ChatMessagesPayload),
    ChatError(ChatErrorPayload),
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::ChatMessages(_) => EVENT_CHAT_MESSAGES,
            ChatEvent::ChatError(_) => EVENT_CHAT_ERROR,
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            ChatEvent::ChatMessages(p) => &p.chat_id,
            ChatEvent::ChatError(p) => &p.chat_id,
        }
    }
}

pub fn emit_event(sink: &mpsc::UnboundedSender<ChatEvent>, event: ChatEvent) {
    let name = event.name();
    if sink.send(event).is_err() {
        tracing::error!(event = name, "Failed to emit event: receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_serialized_tags() {
        let event = ChatEvent::ChatError(ChatErrorPayload {
            chat_id: "u1_u2".into(),
            message: "boom".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], EVENT_CHAT_ERROR);
        assert_eq!(json["payload"]["chatId"], "u1_u2");
        assert_eq!(event.chat_id(), "u1_u2");
    }
}
