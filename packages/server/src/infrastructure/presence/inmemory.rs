//! InMemory PresenceRegistry 実装
//!
//! 正引き（user → connections）と逆引き（connection → user）の 2 つの
//! HashMap を 1 つの Mutex で保護します。両方の更新は同じクリティカル
//! セクション内で行うため、片方だけが更新された状態は観測されません。
//!
//! 切断は逆引きインデックスで所有者を特定します。正引きを走査して
//! 最初に一致したユーザーから外す、という実装はしません。

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, PresenceEntry, PresenceRegistry, UserId};

#[derive(Debug, Default)]
struct PresenceIndex {
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, UserId>,
}

impl PresenceIndex {
    /// 登録し、付け替えが発生した場合は元の所有者を返す
    fn insert(&mut self, user_id: UserId, connection_id: ConnectionId) -> Option<UserId> {
        let previous = self
            .by_connection
            .insert(connection_id, user_id.clone())
            .filter(|previous| previous != &user_id);
        if let Some(previous) = &previous {
            self.detach(previous, &connection_id);
        }
        self.by_user.entry(user_id).or_default().insert(connection_id);
        previous
    }

    fn remove(&mut self, connection_id: &ConnectionId) -> Option<UserId> {
        let owner = self.by_connection.remove(connection_id)?;
        self.detach(&owner, connection_id);
        Some(owner)
    }

    /// 正引き側から外す。空になったエントリは削除する。
    fn detach(&mut self, user_id: &UserId, connection_id: &ConnectionId) {
        if let Some(connections) = self.by_user.get_mut(user_id) {
            connections.remove(connection_id);
            if connections.is_empty() {
                self.by_user.remove(user_id);
            }
        }
    }
}

/// インメモリ PresenceRegistry 実装
///
/// プロセス起動時は空。永続化も復元もしない。
#[derive(Debug, Default)]
pub struct InMemoryPresenceRegistry {
    index: Mutex<PresenceIndex>,
}

impl InMemoryPresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// オンラインのユーザー数
    pub async fn count_online_users(&self) -> usize {
        self.index.lock().await.by_user.len()
    }

    /// 生存中の接続数（全ユーザー合計）
    pub async fn count_connections(&self) -> usize {
        self.index.lock().await.by_connection.len()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresenceRegistry {
    async fn register(&self, user_id: UserId, connection_id: ConnectionId) {
        let rebound_from = {
            let mut index = self.index.lock().await;
            index.insert(user_id.clone(), connection_id)
        };

        match rebound_from {
            Some(previous) => tracing::warn!(
                "Connection '{}' rebound from '{}' to '{}'",
                connection_id,
                previous,
                user_id
            ),
            None => tracing::debug!("Connection '{}' registered for '{}'", connection_id, user_id),
        }
    }

    async fn unregister(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let owner = {
            let mut index = self.index.lock().await;
            index.remove(connection_id)
        };

        match &owner {
            Some(user_id) => {
                tracing::debug!("Connection '{}' unregistered from '{}'", connection_id, user_id)
            }
            None => tracing::debug!("Connection '{}' already unregistered", connection_id),
        }
        owner
    }

    async fn lookup(&self, user_id: &UserId) -> HashSet<ConnectionId> {
        let index = self.index.lock().await;
        index.by_user.get(user_id).cloned().unwrap_or_default()
    }

    async fn owner_of(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let index = self.index.lock().await;
        index.by_connection.get(connection_id).cloned()
    }

    async fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = {
            let index = self.index.lock().await;
            index
                .by_user
                .iter()
                .map(|(user_id, connections)| PresenceEntry {
                    user_id: user_id.clone(),
                    connection_ids: connections.iter().copied().collect::<BTreeSet<_>>(),
                })
                .collect()
        };
        entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        entries
    }
}
