//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を ConnectionId で管理
//! - PushEvent をワイヤ形式（JSON）にして 1 つの接続へ送る
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//! 受信側（pusher ループ）が終了した接続へ送ると失敗し、
//! DeliveryDispatcher がその接続を整理します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, PushEvent, PusherChannel},
    infrastructure::dto::websocket::ServerFrame,
};

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_channel(connection_id, tx).await;
/// pusher.push_to(&connection_id, &event).await?;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの WebSocket sender
    channels: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録されているチャンネル数
    pub async fn count_channels(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_channel(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut channels = self.channels.lock().await;
        channels.insert(connection_id, sender);
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
    }

    async fn unregister_channel(&self, connection_id: &ConnectionId) {
        let mut channels = self.channels.lock().await;
        if channels.remove(connection_id).is_some() {
            tracing::debug!(
                "Connection '{}' unregistered from MessagePusher",
                connection_id
            );
        }
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &PushEvent,
    ) -> Result<(), MessagePushError> {
        // ロックはチャンネルの複製までに限定する
        let sender = {
            let channels = self.channels.lock().await;
            channels.get(connection_id).cloned()
        }
        .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;

        let payload = serde_json::to_string(&ServerFrame::from(event))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;

        sender
            .send(payload)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!(
            "Pushed {} event to connection '{}'",
            event.kind(),
            connection_id
        );
        Ok(())
    }
}
