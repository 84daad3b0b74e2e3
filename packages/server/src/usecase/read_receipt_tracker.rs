//! UseCase: 既読処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ReadReceiptTracker::mark_read() メソッド
//! - 一括既読と、元の送信者の接続への既読通知
//!
//! ### なぜこのテストが必要か
//! - 変更が無い場合は通知しない（冪等性）ことを保証
//! - ストアの失敗時に通知しないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：未読あり → 既読通知
//! - エッジケース：2 回目の呼び出し（未読 0）
//! - 異常系：ストアの失敗・タイムアウト

use std::{sync::Arc, time::Duration};

use dengon_shared::time::Clock;

use crate::domain::{MessageRepository, PushEvent, RepositoryError, Timestamp, UserId};

use super::{DeliveryDispatcher, within_store_timeout};

/// 一括既読と既読通知
pub struct ReadReceiptTracker {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn MessageRepository>,
    dispatcher: Arc<DeliveryDispatcher>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl ReadReceiptTracker {
    pub fn new(
        repository: Arc<dyn MessageRepository>,
        dispatcher: Arc<DeliveryDispatcher>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
            store_timeout,
        }
    }

    /// sender → receiver の未読を全て既読にし、変更があれば sender に通知する
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - 既読にした件数（0 なら通知しない）
    /// * `Err(RepositoryError)` - ストアの失敗（既読状態は反映されていない）
    pub async fn mark_read(
        &self,
        receiver: &UserId,
        sender: &UserId,
    ) -> Result<usize, RepositoryError> {
        let read_at = Timestamp::new(self.clock.now_millis());

        let count = within_store_timeout(
            self.store_timeout,
            self.repository.bulk_mark_read(sender, receiver, read_at),
        )
        .await?;

        if count == 0 {
            tracing::debug!("No unread messages from '{}' to '{}'", sender, receiver);
            return Ok(0);
        }

        tracing::info!(
            "'{}' read {} message(s) from '{}'",
            receiver,
            count,
            sender
        );
        // 既読通知の配信は待たない
        let event = PushEvent::read(receiver.clone(), read_at);
        self.dispatcher.dispatch(sender.clone(), event);

        Ok(count)
    }

    /// sender → receiver の未読件数
    pub async fn unread_count(
        &self,
        receiver: &UserId,
        sender: &UserId,
    ) -> Result<usize, RepositoryError> {
        let unread = within_store_timeout(
            self.store_timeout,
            self.repository.query_unread(sender, receiver),
        )
        .await?;
        Ok(unread.len())
    }
}

#[cfg(test)]
mod tests {
    use dengon_shared::time::FixedClock;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        domain::{
            ConnectionId, MessagePolicy, MessagePusher, MockMessageRepository, NewMessage,
            PresenceRegistry,
        },
        infrastructure::{
            dto::websocket::ServerFrame, message_pusher::WebSocketMessagePusher,
            presence::InMemoryPresenceRegistry, repository::InMemoryMessageRepository,
        },
    };

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    /// バックグラウンドの配信を待って 1 フレーム受け取る
    async fn recv_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> ServerFrame {
        let json = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no frame within 1s")
            .expect("channel closed");
        serde_json::from_str(&json).unwrap()
    }

    /// 配信タスクが走り終わるのを待ってから、何も届いていないことを確認する
    async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<String>) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    struct Fixture {
        repository: Arc<InMemoryMessageRepository>,
        presence: Arc<InMemoryPresenceRegistry>,
        pusher: Arc<WebSocketMessagePusher>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repository: Arc::new(InMemoryMessageRepository::new()),
                presence: Arc::new(InMemoryPresenceRegistry::new()),
                pusher: Arc::new(WebSocketMessagePusher::new()),
            }
        }

        fn tracker(&self, repository: Arc<dyn MessageRepository>) -> ReadReceiptTracker {
            let dispatcher = Arc::new(DeliveryDispatcher::new(
                self.presence.clone(),
                self.pusher.clone(),
            ));
            ReadReceiptTracker::new(
                repository,
                dispatcher,
                Arc::new(FixedClock::new(5_000)),
                Duration::from_millis(200),
            )
        }

        async fn connect(&self, user_id: &UserId) -> mpsc::UnboundedReceiver<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            let connection_id = ConnectionId::generate();
            self.pusher.register_channel(connection_id, tx).await;
            self.presence.register(user_id.clone(), connection_id).await;
            rx
        }

        async fn send(&self, from: &str, to: &str, body: &str) {
            self.repository
                .append(NewMessage {
                    sender: user(from),
                    receiver: user(to),
                    body: MessagePolicy::default()
                        .parse_body(body.to_string())
                        .unwrap(),
                    sent_at: Timestamp::new(1_000),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_mark_read_notifies_sender_once() {
        // テスト項目: 未読があれば送信者に既読通知し、2 回目は 0 件で通知しない
        // given (前提条件):
        let fixture = Fixture::new();
        let tracker = fixture.tracker(fixture.repository.clone());
        let alice = user("alice");
        let bob = user("bob");
        let mut alice_rx = fixture.connect(&alice).await;
        fixture.send("alice", "bob", "hello").await;
        fixture.send("alice", "bob", "are you there?").await;

        // when (操作): bob が alice からのメッセージを既読にする
        let first = tracker.mark_read(&bob, &alice).await.unwrap();
        let second = tracker.mark_read(&bob, &alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(
            recv_frame(&mut alice_rx).await,
            ServerFrame::Read {
                receiver_id: "bob".to_string(),
                read_up_to: 5_000
            }
        );
        assert_silent(&mut alice_rx).await;
        assert_eq!(tracker.unread_count(&bob, &alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_without_unread_sends_nothing() {
        // テスト項目: 未読が無ければ通知しない
        // given (前提条件):
        let fixture = Fixture::new();
        let tracker = fixture.tracker(fixture.repository.clone());
        let alice = user("alice");
        let mut alice_rx = fixture.connect(&alice).await;

        // when (操作):
        let count = tracker.mark_read(&user("bob"), &alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(count, 0);
        assert_silent(&mut alice_rx).await;
    }

    #[tokio::test]
    async fn test_mark_read_storage_failure_sends_nothing() {
        // テスト項目: ストアが失敗したらエラーを返し、通知しない
        // given (前提条件):
        let fixture = Fixture::new();
        let mut repository = MockMessageRepository::new();
        repository
            .expect_bulk_mark_read()
            .times(1)
            .returning(|_, _, _| Err(RepositoryError::StorageFailure("disk full".to_string())));
        let tracker = fixture.tracker(Arc::new(repository));
        let alice = user("alice");
        let mut alice_rx = fixture.connect(&alice).await;

        // when (操作):
        let result = tracker.mark_read(&user("bob"), &alice).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::StorageFailure("disk full".to_string()))
        );
        assert_silent(&mut alice_rx).await;
    }

    #[tokio::test]
    async fn test_mark_read_passes_sender_and_receiver_in_store_order() {
        // テスト項目: bulk_mark_read には (sender, receiver) の順で渡される
        // given (前提条件):
        let fixture = Fixture::new();
        let mut repository = MockMessageRepository::new();
        repository
            .expect_bulk_mark_read()
            .withf(|sender, receiver, read_at| {
                sender.as_str() == "alice"
                    && receiver.as_str() == "bob"
                    && *read_at == Timestamp::new(5_000)
            })
            .times(1)
            .returning(|_, _, _| Ok(0));
        let tracker = fixture.tracker(Arc::new(repository));

        // when (操作):
        let result = tracker.mark_read(&user("bob"), &user("alice")).await;

        // then (期待する結果):
        assert_eq!(result, Ok(0));
    }
}
