//! 値オブジェクト
//!
//! 生成時にバリデーションを行い、生成後は不変。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// 認証済みユーザーの識別子
///
/// 外部の認証コラボレーターが発行する。このサブシステムは所有しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub const MAX_LEN: usize = 64;

    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::EmptyUserId);
        }
        let valid_chars = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_chars || value.len() > Self::MAX_LEN {
            return Err(ValueObjectError::InvalidUserId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// トランスポート接続の識別子
///
/// 接続ごとに新しく発行され、再接続は別の ConnectionId になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// 新しい ConnectionId を発行（UUID v4）
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// サーバーが採番するメッセージ ID（ストア内で単調増加）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// メッセージ本文
///
/// 空白のみの本文と、上限文字数を超える本文は作れない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 本文のバリデーションポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePolicy {
    /// 本文の最大文字数（Unicode scalar value 単位）
    pub max_body_chars: usize,
}

impl MessagePolicy {
    pub const DEFAULT_MAX_BODY_CHARS: usize = 4000;

    pub fn new(max_body_chars: usize) -> Self {
        Self { max_body_chars }
    }

    pub fn parse_body(&self, value: String) -> Result<MessageBody, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::EmptyMessageBody);
        }
        let actual = value.chars().count();
        if actual > self.max_body_chars {
            return Err(ValueObjectError::MessageBodyTooLong {
                max: self.max_body_chars,
                actual,
            });
        }
        Ok(MessageBody(value))
    }
}

impl Default for MessagePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_BODY_CHARS)
    }
}
