//! UseCase 層
//!
//! - `DeliveryDispatcher`: 生存中の全接続へのイベント配信
//! - `ReadReceiptTracker`: 一括既読と送信者への既読通知
//! - `ChatGateway`: 接続ライフサイクルとトランスポート層からの唯一の入口

mod chat_gateway;
mod delivery_dispatcher;
mod error;
mod read_receipt_tracker;

use std::{future::Future, time::Duration};

use crate::domain::RepositoryError;

pub use chat_gateway::{ChatGateway, ConnectionState, GatewayConfig};
pub use delivery_dispatcher::{DeliveryDispatcher, DeliveryReport};
pub use error::GatewayError;
pub use read_receipt_tracker::ReadReceiptTracker;

/// ストア呼び出しを `timeout` で打ち切る。タイムアウトは StorageFailure として扱う。
async fn within_store_timeout<T, F>(timeout: Duration, call: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        RepositoryError::StorageFailure(format!("timed out after {}ms", timeout.as_millis()))
    })?
}
