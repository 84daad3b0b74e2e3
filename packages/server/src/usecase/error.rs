//! UseCase 層のエラー型
//!
//! 呼び出し元（送信者）に見えるのはこの 3 種類だけ。
//! プッシュ失敗やオフラインの受信者はエラーにしない。

use thiserror::Error;

use crate::domain::{RepositoryError, ValueObjectError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// 接続に認証済みの ID が紐付いていない（未接続・切断済み）
    #[error("connection has no authenticated identity")]
    AuthenticationMissing,

    /// 本文や宛先 ID が不正
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] ValueObjectError),

    /// ストアの失敗。メッセージや既読状態は反映されていない。
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<RepositoryError> for GatewayError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::StorageFailure(reason) => Self::StorageFailure(reason),
        }
    }
}
