//! 接続へプッシュされるイベント
//!
//! 永続化はされない一時的な通知。ワイヤ形式への変換は
//! Infrastructure 層の DTO が担う。

use super::{
    entity::DirectMessage,
    value_object::{MessageBody, MessageId, Timestamp, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// 新着メッセージ
    Message {
        sender_id: UserId,
        message_id: MessageId,
        body: MessageBody,
        sent_at: Timestamp,
    },
    /// 「receiver_id が read_up_to までのメッセージを読んだ」
    Read {
        receiver_id: UserId,
        read_up_to: Timestamp,
    },
}

impl PushEvent {
    pub fn message(message: &DirectMessage) -> Self {
        Self::Message {
            sender_id: message.sender.clone(),
            message_id: message.id,
            body: message.body.clone(),
            sent_at: message.sent_at,
        }
    }

    pub fn read(receiver_id: UserId, read_up_to: Timestamp) -> Self {
        Self::Read {
            receiver_id,
            read_up_to,
        }
    }

    /// ログ用の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Read { .. } => "read",
        }
    }
}
