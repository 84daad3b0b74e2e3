//! WebSocket frame DTOs.
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

/// Frames sent from the server to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once, right after the upgrade.
    Connected {
        connection_id: String,
        user_id: String,
    },
    /// Pushed to every live connection of the receiver.
    Message {
        sender_id: String,
        message_id: u64,
        body: String,
        sent_at: i64,
    },
    /// Pushed to every live connection of the original sender.
    Read {
        receiver_id: String,
        read_up_to: i64,
    },
    /// Ack for a `send` frame.
    Sent { message_id: u64, sent_at: i64 },
    /// Ack for a `mark_read` frame.
    MarkedRead { sender_id: String, count: usize },
    /// Reply to a `history` frame.
    History {
        peer_id: String,
        messages: Vec<HistoryMessage>,
    },
    /// Reply to an `unread_count` frame.
    UnreadCount { sender_id: String, count: usize },
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub message_id: u64,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub sent_at: i64,
    /// `None` while unread
    pub read_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthenticationMissing,
    InvalidMessage,
    StorageFailure,
    BadRequest,
}

/// Frames sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Send { receiver_id: String, body: String },
    MarkRead { sender_id: String },
    History {
        peer_id: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Count of unread messages from `sender_id` to this connection's user.
    UnreadCount { sender_id: String },
}
