//! Repository trait 定義
//!
//! メッセージストア（外部コラボレーター）の契約。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{DirectMessage, NewMessage},
    error::RepositoryError,
    value_object::{Timestamp, UserId},
};

/// Message Repository trait
///
/// 追記専用のメッセージ履歴と既読状態を永続化する。
/// 異なる (sender, receiver) ペアに対する呼び出しは並行に安全でなければならない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// メッセージを永続化し、ID を採番した DirectMessage を返す
    ///
    /// エラー時は何も永続化されていない。
    async fn append(&self, message: NewMessage) -> Result<DirectMessage, RepositoryError>;

    /// sender → receiver の未読メッセージを ID 順に取得
    async fn query_unread(
        &self,
        sender: &UserId,
        receiver: &UserId,
    ) -> Result<Vec<DirectMessage>, RepositoryError>;

    /// sender → receiver の未読メッセージを全て既読にし、変更件数を返す
    ///
    /// 未読が無ければ 0 を返す（冪等）。
    async fn bulk_mark_read(
        &self,
        sender: &UserId,
        receiver: &UserId,
        read_at: Timestamp,
    ) -> Result<usize, RepositoryError>;

    /// 2 ユーザー間の直近 `limit` 件のメッセージを ID 昇順で取得
    async fn history(
        &self,
        user: &UserId,
        peer: &UserId,
        limit: usize,
    ) -> Result<Vec<DirectMessage>, RepositoryError>;
}
