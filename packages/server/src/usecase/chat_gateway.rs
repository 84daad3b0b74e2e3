//! UseCase: DM ゲートウェイ
//!
//! トランスポート層から呼ばれる唯一の入口。接続ごとのライフサイクル
//! （Connected → Disconnected）を管理し、PresenceRegistry・MessageRepository・
//! DeliveryDispatcher・ReadReceiptTracker を組み合わせる。
//!
//! ## 送信の順序保証
//!
//! 1. 接続から認証済みの送信者を解決（無ければ AuthenticationMissing）
//! 2. 本文のバリデーション（InvalidMessage）
//! 3. MessageRepository::append で永続化（StorageFailure）
//! 4. 永続化に成功した場合のみ受信者の全接続へ push
//!
//! 4 はバックグラウンドのタスクで行い、送信の呼び出しは完了を待たない。
//! 応答しない接続があっても送信者の呼び出しは遅れない。結果は送信の成否に
//! 影響しない。同じ受信者への push 同士の到着順は保証しないため、クライアントは
//! message_id で並べ替える。3 と 4 はアトミックではないため、
//! 永続化後・push 前にクラッシュしても、再接続したクライアントは履歴の
//! pull で回収する。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - on_connect / on_disconnect / send_message / mark_read / history
//!
//! ### なぜこのテストが必要か
//! - 永続化に失敗したメッセージが決して push されないことを保証
//! - 認証・バリデーションの失敗がストアに到達しないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：オンライン／オフラインの受信者への送信
//! - 異常系：未認証、不正な本文、ストアの失敗・タイムアウト
//! - エッジケース：二重切断、切断後の送信

use std::{sync::Arc, time::Duration};

use dengon_shared::time::{Clock, millis_to_jst_rfc3339};

use crate::domain::{
    ConnectionId, DirectMessage, MessagePolicy, MessagePusher, MessageRepository, NewMessage,
    PresenceEntry, PresenceRegistry, PushEvent, PusherChannel, Timestamp, UserId,
};

use super::{DeliveryDispatcher, GatewayError, ReadReceiptTracker, within_store_timeout};

/// ゲートウェイの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// 本文のバリデーションポリシー
    pub policy: MessagePolicy,
    /// ストア呼び出しの上限時間
    pub store_timeout: Duration,
}

impl GatewayConfig {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            policy: MessagePolicy::default(),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// 接続の状態。Disconnected は終端（再接続は新しい ConnectionId）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// DM ゲートウェイ
pub struct ChatGateway {
    /// PresenceRegistry（接続と認証済み ID の紐付け）
    presence: Arc<dyn PresenceRegistry>,
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn MessageRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    dispatcher: Arc<DeliveryDispatcher>,
    read_receipts: ReadReceiptTracker,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
}

impl ChatGateway {
    /// history で一度に返す最大件数
    pub const MAX_HISTORY_LIMIT: usize = 200;

    /// 新しい ChatGateway を作成
    ///
    /// DeliveryDispatcher と ReadReceiptTracker は同じ PresenceRegistry・
    /// MessagePusher・MessageRepository を共有して内部で組み立てる。
    pub fn new(
        presence: Arc<dyn PresenceRegistry>,
        repository: Arc<dyn MessageRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        config: GatewayConfig,
    ) -> Self {
        let dispatcher = Arc::new(DeliveryDispatcher::new(
            presence.clone(),
            message_pusher.clone(),
        ));
        Self::with_dispatcher(presence, repository, message_pusher, dispatcher, clock, config)
    }

    /// DeliveryDispatcher を差し替えて作成（push のタイムアウトを変える場合など）
    pub fn with_dispatcher(
        presence: Arc<dyn PresenceRegistry>,
        repository: Arc<dyn MessageRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        dispatcher: Arc<DeliveryDispatcher>,
        clock: Arc<dyn Clock>,
        config: GatewayConfig,
    ) -> Self {
        let read_receipts = ReadReceiptTracker::new(
            repository.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.store_timeout,
        );
        Self {
            presence,
            repository,
            message_pusher,
            dispatcher,
            read_receipts,
            clock,
            config,
        }
    }

    /// 接続を受け付け、新しい ConnectionId を発行する
    ///
    /// 送信チャンネルを先に登録してから PresenceRegistry に登録するため、
    /// push がチャンネルの無い接続を見つけることはない。
    pub async fn on_connect(&self, user_id: UserId, sender: PusherChannel) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        self.message_pusher
            .register_channel(connection_id, sender)
            .await;
        self.presence.register(user_id.clone(), connection_id).await;
        tracing::info!("'{}' connected on '{}'", user_id, connection_id);
        connection_id
    }

    /// 接続を終了する（冪等）
    pub async fn on_disconnect(&self, connection_id: &ConnectionId) {
        match self.presence.unregister(connection_id).await {
            Some(user_id) => tracing::info!("'{}' disconnected from '{}'", user_id, connection_id),
            None => tracing::debug!("Connection '{}' was already cleaned up", connection_id),
        }
        self.message_pusher.unregister_channel(connection_id).await;
    }

    pub async fn connection_state(&self, connection_id: &ConnectionId) -> ConnectionState {
        match self.presence.owner_of(connection_id).await {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    /// メッセージを送信する
    ///
    /// # Returns
    ///
    /// * `Ok(DirectMessage)` - 永続化済みのメッセージ（`id` がサーバー採番の ID）
    /// * `Err(GatewayError)` - 未認証・不正な本文・ストアの失敗
    pub async fn send_message(
        &self,
        sender_connection: &ConnectionId,
        receiver: UserId,
        body: String,
    ) -> Result<DirectMessage, GatewayError> {
        // 1. 送信者を解決
        let sender = self.authenticated_user(sender_connection).await?;

        // 2. 本文のバリデーション
        let body = self.config.policy.parse_body(body)?;

        // 3. 永続化（完了するまで push しない）
        let new_message = NewMessage {
            sender,
            receiver,
            body,
            sent_at: Timestamp::new(self.clock.now_millis()),
        };
        let persisted = within_store_timeout(
            self.config.store_timeout,
            self.repository.append(new_message),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist message from '{}': {}", sender_connection, e);
            GatewayError::from(e)
        })?;

        tracing::info!(
            "Message {} persisted: '{}' -> '{}' (sent at {})",
            persisted.id,
            persisted.sender,
            persisted.receiver,
            millis_to_jst_rfc3339(persisted.sent_at.value()).unwrap_or_default()
        );

        // 4. push（配信は待たず、結果は送信の成否に影響しない）
        let event = PushEvent::message(&persisted);
        self.dispatcher.dispatch(persisted.receiver.clone(), event);

        Ok(persisted)
    }

    /// 接続のユーザーが sender からのメッセージを既読にする
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - 既読にした件数
    pub async fn mark_read(
        &self,
        receiver_connection: &ConnectionId,
        sender: UserId,
    ) -> Result<usize, GatewayError> {
        let receiver = self.authenticated_user(receiver_connection).await?;
        self.read_receipts
            .mark_read(&receiver, &sender)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to mark messages from '{}' as read for '{}': {}",
                    sender,
                    receiver,
                    e
                );
                GatewayError::from(e)
            })
    }

    /// 接続のユーザーと peer の間の直近の履歴（pull）
    ///
    /// `limit` は MAX_HISTORY_LIMIT で頭打ちにする。
    pub async fn history(
        &self,
        connection_id: &ConnectionId,
        peer: UserId,
        limit: usize,
    ) -> Result<Vec<DirectMessage>, GatewayError> {
        let user = self.authenticated_user(connection_id).await?;
        let limit = limit.min(Self::MAX_HISTORY_LIMIT);
        let messages = within_store_timeout(
            self.config.store_timeout,
            self.repository.history(&user, &peer, limit),
        )
        .await?;
        Ok(messages)
    }

    /// 接続のユーザー宛ての sender からの未読件数
    pub async fn unread_count(
        &self,
        connection_id: &ConnectionId,
        sender: UserId,
    ) -> Result<usize, GatewayError> {
        let receiver = self.authenticated_user(connection_id).await?;
        Ok(self.read_receipts.unread_count(&receiver, &sender).await?)
    }

    pub async fn presence_snapshot(&self) -> Vec<PresenceEntry> {
        self.presence.snapshot().await
    }

    async fn authenticated_user(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<UserId, GatewayError> {
        self.presence
            .owner_of(connection_id)
            .await
            .ok_or(GatewayError::AuthenticationMissing)
    }
}
