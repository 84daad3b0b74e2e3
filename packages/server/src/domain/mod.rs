//! ドメイン層
//!
//! DM ゲートウェイのドメインモデルと、ドメイン層が必要とする
//! 外部コラボレーター（プレゼンス、メッセージストア、プッシュ）の
//! インターフェースを定義します。

pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod presence;
pub mod repository;
pub mod value_object;

pub use entity::{DirectMessage, NewMessage, PresenceEntry, ReadState};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use event::PushEvent;
pub use message_pusher::{MessagePusher, PusherChannel};
pub use presence::PresenceRegistry;
pub use repository::MessageRepository;
#[cfg(test)]
pub use repository::MockMessageRepository;
pub use value_object::{ConnectionId, MessageBody, MessageId, MessagePolicy, Timestamp, UserId};
