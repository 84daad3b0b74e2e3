//! ドメイン層のエラー型

use thiserror::Error;

/// 値オブジェクトの生成に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("invalid user id '{0}': only ASCII alphanumerics, '-' and '_' are allowed (max 64 chars)")]
    InvalidUserId(String),

    #[error("message body must not be empty")]
    EmptyMessageBody,

    #[error("message body is too long ({actual} chars, max {max})")]
    MessageBodyTooLong { max: usize, actual: usize },
}

/// MessageRepository（メッセージストア）のエラー
///
/// ストアの失敗は全て「永続化されなかった」として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

/// MessagePusher のエラー
///
/// ゲートウェイの呼び出し元には決して返さない。DeliveryDispatcher が
/// ログ出力と接続の整理に使う。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' has no registered channel")]
    ConnectionNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),
}
