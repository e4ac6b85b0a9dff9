//! 値オブジェクト
//!
//! 識別子は空文字列を許容しない不変の値として扱います。

use serde::{Deserialize, Serialize};

use super::error::ValueObjectError;

/// チャット（ルーム）ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// 新しい ChatId を作成（空文字列はエラー）
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::EmptyChatId);
        }
        Ok(Self(value))
    }

    /// ランダムな ChatId を生成
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ChatId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// ユーザー ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// 新しい UserId を作成（空文字列はエラー）
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::EmptyUserId);
        }
        Ok(Self(value))
    }

    /// システムメッセージの作者を表す空の UserId
    pub(crate) fn system() -> Self {
        Self(String::new())
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

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id_rejects_blank_value() {
        // テスト項目: 空白のみの ChatId は作成できない
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = ChatId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyChatId));
    }

    #[test]
    fn test_generated_chat_ids_are_unique() {
        // テスト項目: 生成された ChatId は毎回異なる
        // given (前提条件):

        // when (操作):
        let first = ChatId::generate();
        let second = ChatId::generate();

        // then (期待する結果):
        assert_ne!(first, second);
        assert!(!first.as_str().is_empty());
    }

    #[test]
    fn test_user_id_try_from_string() {
        // テスト項目: String から UserId に変換できる
        // given (前提条件):
        let value = "alice".to_string();

        // when (操作):
        let user_id = UserId::try_from(value).unwrap();

        // then (期待する結果):
        assert_eq!(user_id.as_str(), "alice");
        assert_eq!(user_id.to_string(), "alice");
    }

    #[test]
    fn test_user_id_rejects_empty_value() {
        // テスト項目: 空の UserId は作成できない
        // given (前提条件):
        let value = String::new();

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyUserId));
    }
}
