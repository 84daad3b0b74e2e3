//! UseCase: イベント配信
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DeliveryDispatcher::push() メソッド
//! - 対象ユーザーの全接続への配信と、失敗した接続の整理
//!
//! ### なぜこのテストが必要か
//! - マルチデバイスの全接続に届くことを保証
//! - 1 つの接続の失敗・停止が他の接続や呼び出し元に波及しないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：N 接続への配信
//! - エッジケース：オフライン（接続 0）
//! - 異常系：一部の接続が閉じている／応答しない

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::task::JoinHandle;

use crate::domain::{
    ConnectionId, MessagePushError, MessagePusher, PresenceRegistry, PushEvent, UserId,
};

/// 1 回の push の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// 送信に成功した接続数
    pub delivered: usize,
    /// 失敗して整理（暗黙の切断）した接続数
    pub pruned: usize,
}

/// 対象ユーザーの生存中の全接続へイベントを配信する
pub struct DeliveryDispatcher {
    /// PresenceRegistry（配信先の解決）
    presence: Arc<dyn PresenceRegistry>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// 1 接続あたりの送信の上限時間
    push_timeout: Duration,
}

impl DeliveryDispatcher {
    pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self::with_push_timeout(presence, message_pusher, Self::DEFAULT_PUSH_TIMEOUT)
    }

    pub fn with_push_timeout(
        presence: Arc<dyn PresenceRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        push_timeout: Duration,
    ) -> Self {
        Self {
            presence,
            message_pusher,
            push_timeout,
        }
    }

    /// `target` の全接続へ `event` を配信
    ///
    /// 接続が無ければ破棄する（オフラインの受信者は履歴の pull で回収する）。
    /// 各接続への送信は独立して並行に行い、失敗・タイムアウトした接続は
    /// PresenceRegistry と MessagePusher から外す。結果は呼び出し元の成否に影響しない。
    pub async fn push(&self, target: &UserId, event: &PushEvent) -> DeliveryReport {
        let connections = self.presence.lookup(target).await;
        if connections.is_empty() {
            tracing::debug!(
                "'{}' is offline, dropping {} event",
                target,
                event.kind()
            );
            return DeliveryReport::default();
        }

        let attempts = connections.iter().map(|connection_id| async move {
            let result = self.push_one(connection_id, event).await;
            (*connection_id, result)
        });

        let mut report = DeliveryReport::default();
        for (connection_id, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to push {} event to '{}' on connection '{}': {}. Pruning connection",
                        event.kind(),
                        target,
                        connection_id,
                        e
                    );
                    self.prune(&connection_id).await;
                    report.pruned += 1;
                }
            }
        }

        tracing::debug!(
            "Pushed {} event to '{}': delivered={}, pruned={}",
            event.kind(),
            target,
            report.delivered,
            report.pruned
        );
        report
    }

    /// `push` をバックグラウンドのタスクで実行する
    ///
    /// 呼び出し元は配信の完了を待たない。応答しない接続があっても
    /// 呼び出し元は最大 `push_timeout` 待たされることはない。
    /// 返り値の JoinHandle は破棄してよい。
    pub fn dispatch(
        self: &Arc<Self>,
        target: UserId,
        event: PushEvent,
    ) -> JoinHandle<DeliveryReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.push(&target, &event).await })
    }

    async fn push_one(
        &self,
        connection_id: &ConnectionId,
        event: &PushEvent,
    ) -> Result<(), MessagePushError> {
        tokio::time::timeout(
            self.push_timeout,
            self.message_pusher.push_to(connection_id, event),
        )
        .await
        .map_err(|_| {
            MessagePushError::PushFailed(format!(
                "timed out after {}ms",
                self.push_timeout.as_millis()
            ))
        })?
    }

    /// 暗黙の切断として接続を整理する
    async fn prune(&self, connection_id: &ConnectionId) {
        self.presence.unregister(connection_id).await;
        self.message_pusher.unregister_channel(connection_id).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tokio::sync::{Mutex, mpsc};

    use super::*;
    use crate::{
        domain::{PusherChannel, Timestamp},
        infrastructure::{
            message_pusher::WebSocketMessagePusher, presence::InMemoryPresenceRegistry,
        },
    };

    // 指定した接続への送信だけが永遠に終わらない MessagePusher
    struct StallingPusher {
        stalled: ConnectionId,
        delivered: Mutex<Vec<ConnectionId>>,
    }

    #[async_trait]
    impl MessagePusher for StallingPusher {
        async fn register_channel(&self, _connection_id: ConnectionId, _sender: PusherChannel) {}

        async fn unregister_channel(&self, _connection_id: &ConnectionId) {}

        async fn push_to(
            &self,
            connection_id: &ConnectionId,
            _event: &PushEvent,
        ) -> Result<(), MessagePushError> {
            if *connection_id == self.stalled {
                std::future::pending::<()>().await;
            }
            self.delivered.lock().await.push(*connection_id);
            Ok(())
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn event() -> PushEvent {
        PushEvent::read(user("bob"), Timestamp::new(1))
    }

    async fn connect(
        presence: &InMemoryPresenceRegistry,
        pusher: &WebSocketMessagePusher,
        user_id: &UserId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        pusher.register_channel(connection_id, tx).await;
        presence.register(user_id.clone(), connection_id).await;
        (connection_id, rx)
    }

    #[tokio::test]
    async fn test_push_delivers_to_every_connection() {
        // テスト項目: N 接続を持つユーザーには N 接続全てに届く
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let dispatcher = DeliveryDispatcher::new(presence.clone(), pusher.clone());
        let alice = user("alice");
        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(connect(&presence, &pusher, &alice).await);
        }

        // when (操作):
        let report = dispatcher.push(&alice, &event()).await;

        // then (期待する結果):
        assert_eq!(report, DeliveryReport { delivered: 3, pruned: 0 });
        for (_, rx) in receivers.iter_mut() {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn test_push_to_offline_user_is_dropped() {
        // テスト項目: 接続の無いユーザーへの push は何もしない
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let dispatcher = DeliveryDispatcher::new(presence, pusher);

        // when (操作):
        let report = dispatcher.push(&user("bob"), &event()).await;

        // then (期待する結果):
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_push_prunes_stale_connections_only() {
        // テスト項目: 閉じた接続は整理され、残りの接続には届く（N - k）
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let dispatcher = DeliveryDispatcher::new(presence.clone(), pusher.clone());
        let alice = user("alice");
        let (_live_id, mut live_rx) = connect(&presence, &pusher, &alice).await;
        let (stale_id, stale_rx) = connect(&presence, &pusher, &alice).await;
        let (other_stale_id, other_stale_rx) = connect(&presence, &pusher, &alice).await;
        drop(stale_rx);
        drop(other_stale_rx);

        // when (操作):
        let report = dispatcher.push(&alice, &event()).await;

        // then (期待する結果):
        assert_eq!(report, DeliveryReport { delivered: 1, pruned: 2 });
        assert!(live_rx.try_recv().is_ok());
        let remaining = presence.lookup(&alice).await;
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&stale_id));
        assert!(!remaining.contains(&other_stale_id));
        assert_eq!(pusher.count_channels().await, 1);
    }

    #[tokio::test]
    async fn test_push_with_unregistered_channel_prunes_presence() {
        // テスト項目: チャンネルの無い接続（PresenceRegistry だけに残った接続）も整理される
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let dispatcher = DeliveryDispatcher::new(presence.clone(), pusher);
        let alice = user("alice");
        presence.register(alice.clone(), ConnectionId::generate()).await;

        // when (操作):
        let report = dispatcher.push(&alice, &event()).await;

        // then (期待する結果):
        assert_eq!(report, DeliveryReport { delivered: 0, pruned: 1 });
        assert!(presence.lookup(&alice).await.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_connection_does_not_block_siblings() {
        // テスト項目: 応答しない接続はタイムアウトで整理され、他の接続には届く
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let alice = user("alice");
        let stalled = ConnectionId::generate();
        let healthy = ConnectionId::generate();
        presence.register(alice.clone(), stalled).await;
        presence.register(alice.clone(), healthy).await;
        let pusher = Arc::new(StallingPusher {
            stalled,
            delivered: Mutex::new(Vec::new()),
        });
        let dispatcher = DeliveryDispatcher::with_push_timeout(
            presence.clone(),
            pusher.clone(),
            Duration::from_millis(50),
        );

        // when (操作):
        let report = dispatcher.push(&alice, &event()).await;

        // then (期待する結果):
        assert_eq!(report, DeliveryReport { delivered: 1, pruned: 1 });
        assert_eq!(*pusher.delivered.lock().await, vec![healthy]);
        assert_eq!(presence.lookup(&alice).await, HashSet::from([healthy]));
    }

    #[tokio::test]
    async fn test_dispatch_returns_before_stalled_push_finishes() {
        // テスト項目: dispatch は配信の完了を待たずに戻り、配信はバックグラウンドで完了する
        // given (前提条件):
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let alice = user("alice");
        let stalled = ConnectionId::generate();
        presence.register(alice.clone(), stalled).await;
        let pusher = Arc::new(StallingPusher {
            stalled,
            delivered: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(DeliveryDispatcher::with_push_timeout(
            presence.clone(),
            pusher,
            Duration::from_millis(300),
        ));

        // when (操作):
        let started = tokio::time::Instant::now();
        let handle = dispatcher.dispatch(alice.clone(), event());
        let returned_after = started.elapsed();

        // then (期待する結果): 呼び出しは即座に戻り、タスクはタイムアウト後に整理して終わる
        assert!(returned_after < Duration::from_millis(100));
        let report = handle.await.unwrap();
        assert_eq!(report, DeliveryReport { delivered: 0, pruned: 1 });
        assert!(presence.lookup(&alice).await.is_empty());
    }
}
