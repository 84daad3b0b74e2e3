//! Conversion logic between domain entities and DTOs.
//!
//! Only the domain → DTO direction exists: inbound client frames carry raw
//! strings that the UI layer validates into value objects.

use crate::domain::{DirectMessage, PresenceEntry, PushEvent, ReadState};
use crate::infrastructure::dto::{http::PresenceEntryDto, websocket as dto};

impl From<&PushEvent> for dto::ServerFrame {
    fn from(event: &PushEvent) -> Self {
        match event {
            PushEvent::Message {
                sender_id,
                message_id,
                body,
                sent_at,
            } => Self::Message {
                sender_id: sender_id.as_str().to_string(),
                message_id: message_id.value(),
                body: body.as_str().to_string(),
                sent_at: sent_at.value(),
            },
            PushEvent::Read {
                receiver_id,
                read_up_to,
            } => Self::Read {
                receiver_id: receiver_id.as_str().to_string(),
                read_up_to: read_up_to.value(),
            },
        }
    }
}

impl From<&DirectMessage> for dto::HistoryMessage {
    fn from(message: &DirectMessage) -> Self {
        let read_at = match message.read_state() {
            ReadState::Unread => None,
            ReadState::Read { read_at } => Some(read_at.value()),
        };
        Self {
            message_id: message.id.value(),
            sender_id: message.sender.as_str().to_string(),
            receiver_id: message.receiver.as_str().to_string(),
            body: message.body.as_str().to_string(),
            sent_at: message.sent_at.value(),
            read_at,
        }
    }
}

impl From<PresenceEntry> for PresenceEntryDto {
    fn from(entry: PresenceEntry) -> Self {
        Self {
            user_id: entry.user_id.into_string(),
            connection_ids: entry
                .connection_ids
                .iter()
                .map(|id| id.to_string())
                .collect(),
        }
    }
}
