//! PresenceRegistry trait 定義
//!
//! ユーザーと生存中の接続の双方向マッピング。プロセスローカルな
//! インメモリ状態であり、メッセージ履歴の正とはしない。
//! プロセス起動時は空で、再起動時は全て破棄される。

use std::collections::HashSet;

use async_trait::async_trait;

use super::{
    entity::PresenceEntry,
    value_object::{ConnectionId, UserId},
};

/// 全ての操作は呼び出し側のロック無しに並行に呼び出せる。
/// 各操作は短いクリティカルセクションで完結し、内部状態を保持したまま
/// I/O を行わない。
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// connection_id を user_id のエントリに追加（冪等）
    ///
    /// connection_id が別ユーザーに紐付いていた場合は付け替える。
    async fn register(&self, user_id: UserId, connection_id: ConnectionId);

    /// connection_id を所有ユーザーから外し、元の所有者を返す
    ///
    /// 未知の connection_id は何もせず `None`。
    /// 所有ユーザーの接続が空になったらエントリごと削除する。
    async fn unregister(&self, connection_id: &ConnectionId) -> Option<UserId>;

    /// user_id の生存中の接続（オフラインなら空集合）
    async fn lookup(&self, user_id: &UserId) -> HashSet<ConnectionId>;

    /// connection_id に紐付いた認証済みユーザー
    async fn owner_of(&self, connection_id: &ConnectionId) -> Option<UserId>;

    /// 全エントリのコピー（user_id 昇順）
    async fn snapshot(&self) -> Vec<PresenceEntry>;
}
