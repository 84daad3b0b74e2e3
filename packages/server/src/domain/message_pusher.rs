//! MessagePusher trait 定義
//!
//! 個々の接続へイベントを届ける通信層の抽象化。
//! どの接続へ送るかは DeliveryDispatcher が PresenceRegistry から決める。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, event::PushEvent, value_object::ConnectionId};

/// 接続ごとの送信チャンネル（シリアライズ済みのフレームを流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信チャンネルを登録
    async fn register_channel(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信チャンネルを登録解除（未知の接続は何もしない）
    async fn unregister_channel(&self, connection_id: &ConnectionId);

    /// 1 つの接続へイベントを送る
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &PushEvent,
    ) -> Result<(), MessagePushError>;
}
