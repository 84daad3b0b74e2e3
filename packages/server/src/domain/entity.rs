//! エンティティ

use std::collections::BTreeSet;

use super::value_object::{ConnectionId, MessageBody, MessageId, Timestamp, UserId};

/// 永続化前のメッセージ
///
/// ID はまだ無い。MessageRepository::append が採番して DirectMessage になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: UserId,
    pub receiver: UserId,
    pub body: MessageBody,
    pub sent_at: Timestamp,
}

/// メッセージの既読状態
///
/// Unread → Read の一方向のみ遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unread,
    Read { read_at: Timestamp },
}

/// 永続化済みのダイレクトメッセージ
///
/// 既読状態以外は不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub body: MessageBody,
    pub sent_at: Timestamp,
    read_state: ReadState,
}

impl DirectMessage {
    /// 採番済み ID で NewMessage を確定させる（未読状態で作成）
    pub fn from_new(id: MessageId, message: NewMessage) -> Self {
        Self {
            id,
            sender: message.sender,
            receiver: message.receiver,
            body: message.body,
            sent_at: message.sent_at,
            read_state: ReadState::Unread,
        }
    }

    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    pub fn is_unread(&self) -> bool {
        self.read_state == ReadState::Unread
    }

    /// 既読にする
    ///
    /// 状態が変わった場合のみ `true`。既読のメッセージは何もしない。
    pub fn mark_read(&mut self, read_at: Timestamp) -> bool {
        match self.read_state {
            ReadState::Unread => {
                self.read_state = ReadState::Read { read_at };
                true
            }
            ReadState::Read { .. } => false,
        }
    }

    /// sender → receiver 方向のメッセージか
    pub fn is_from_to(&self, sender: &UserId, receiver: &UserId) -> bool {
        &self.sender == sender && &self.receiver == receiver
    }

    /// 2 ユーザー間（方向は問わない）のメッセージか
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        self.is_from_to(a, b) || self.is_from_to(b, a)
    }
}

/// ユーザーと、そのユーザーの生存中の接続の集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub connection_ids: BTreeSet<ConnectionId>,
}
