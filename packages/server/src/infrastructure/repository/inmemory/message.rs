//! InMemory Message Repository 実装
//!
//! ドメイン層が定義する MessageRepository trait の具体的な実装。
//!
//! ## ロックの粒度
//!
//! 会話（順不同のユーザーペア）ごとに Mutex を持ちます。
//! 会話マップ全体のロックは会話の取得・作成の間だけ保持するため、
//! 無関係な会話への追記同士は直列化されません。
//!
//! ID は AtomicU64 で採番するため、同じ会話への並行な追記では
//! 採番順と挿入順が入れ替わることがあります。挿入時に ID 順の位置へ
//! 入れることで、会話内は常に ID 昇順を保ちます。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    DirectMessage, MessageId, MessageRepository, NewMessage, RepositoryError, Timestamp, UserId,
};

/// 順不同のユーザーペア
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConversationKey(UserId, UserId);

impl ConversationKey {
    fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

type Conversation = Arc<Mutex<Vec<DirectMessage>>>;

/// インメモリ Message Repository 実装
pub struct InMemoryMessageRepository {
    conversations: Mutex<HashMap<ConversationKey, Conversation>>,
    next_id: AtomicU64,
}

impl InMemoryMessageRepository {
    /// 新しい InMemoryMessageRepository を作成（ID は 1 から採番）
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 保存されているメッセージの総数
    pub async fn count_messages(&self) -> usize {
        let conversations: Vec<Conversation> =
            self.conversations.lock().await.values().cloned().collect();
        let mut total = 0;
        for conversation in conversations {
            total += conversation.lock().await.len();
        }
        total
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> Option<Conversation> {
        let conversations = self.conversations.lock().await;
        conversations.get(&ConversationKey::new(a, b)).cloned()
    }

    async fn conversation_or_create(&self, a: &UserId, b: &UserId) -> Conversation {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(ConversationKey::new(a, b))
            .or_default()
            .clone()
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: NewMessage) -> Result<DirectMessage, RepositoryError> {
        let conversation = self
            .conversation_or_create(&message.sender, &message.receiver)
            .await;

        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let persisted = DirectMessage::from_new(id, message);

        let mut messages = conversation.lock().await;
        let position = messages.partition_point(|m| m.id < id);
        messages.insert(position, persisted.clone());

        Ok(persisted)
    }

    async fn query_unread(
        &self,
        sender: &UserId,
        receiver: &UserId,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let Some(conversation) = self.conversation(sender, receiver).await else {
            return Ok(Vec::new());
        };
        let messages = conversation.lock().await;
        Ok(messages
            .iter()
            .filter(|m| m.is_from_to(sender, receiver) && m.is_unread())
            .cloned()
            .collect())
    }

    async fn bulk_mark_read(
        &self,
        sender: &UserId,
        receiver: &UserId,
        read_at: Timestamp,
    ) -> Result<usize, RepositoryError> {
        let Some(conversation) = self.conversation(sender, receiver).await else {
            return Ok(0);
        };
        let mut messages = conversation.lock().await;
        let mut changed = 0;
        for message in messages
            .iter_mut()
            .filter(|m| m.is_from_to(sender, receiver))
        {
            if message.mark_read(read_at) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn history(
        &self,
        user: &UserId,
        peer: &UserId,
        limit: usize,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let Some(conversation) = self.conversation(user, peer).await else {
            return Ok(Vec::new());
        };
        let messages = conversation.lock().await;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.iter().skip(skip).cloned().collect())
    }
}
