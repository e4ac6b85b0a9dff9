//! ドメインエンティティ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    error::ValueObjectError,
    value_object::{ChatId, UserId},
};

/// 作者名として使われるシステムメッセージの名前
pub const SYSTEM_AUTHOR_NAME: &str = "System";

/// チャットのメタデータ（作成後は不変）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
}

impl Chat {
    /// 新しい Chat を作成（ID は自動生成、空の名前はエラー）
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        if name.trim().is_empty() {
            return Err(ValueObjectError::EmptyChatName);
        }
        Ok(Self {
            id: ChatId::generate(),
            name,
        })
    }

    /// 既存の ID で Chat を復元
    pub fn with_id(id: ChatId, name: String) -> Self {
        Self { id, name }
    }
}

/// チャットから見たユーザー（識別情報のみ。認証は扱わない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(id: UserId, username: String) -> Self {
        Self { id, username }
    }
}

/// チャットメッセージ
///
/// シリアライズ結果のフィールド名がそのままクライアントへのワイヤフォーマットになる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author_id: UserId,
    pub author_name: String,
    pub chat_id: ChatId,
    pub content: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// 新しいメッセージを作成（ID は自動生成）
    pub fn new(author: &User, chat_id: ChatId, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author_id: author.id.clone(),
            author_name: author.username.clone(),
            chat_id,
            content,
            is_edited: false,
            created_at,
        }
    }

    /// システムメッセージを作成（作者 ID は空）
    pub fn system(chat_id: ChatId, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author_id: UserId::system(),
            author_name: SYSTEM_AUTHOR_NAME.to_string(),
            chat_id,
            content,
            is_edited: false,
            created_at,
        }
    }

    pub fn is_system(&self) -> bool {
        self.author_id.as_str().is_empty()
    }
}

/// 作者による自分のメッセージ内容の更新要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdate {
    pub message_id: String,
    pub author_id: UserId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new(UserId::new("alice".to_string()).unwrap(), "Alice".to_string())
    }

    #[test]
    fn test_chat_new_rejects_empty_name() {
        // テスト項目: 空の名前では Chat を作成できない
        // given (前提条件):
        let name = "".to_string();

        // when (操作):
        let result = Chat::new(name);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyChatName));
    }

    #[test]
    fn test_chat_message_copies_author() {
        // テスト項目: 新規メッセージに作者情報がコピーされ、未編集である
        // given (前提条件):
        let author = alice();
        let chat_id = ChatId::new("general".to_string()).unwrap();
        let now = Utc::now();

        // when (操作):
        let msg = ChatMessage::new(&author, chat_id.clone(), "hi".to_string(), now);

        // then (期待する結果):
        assert_eq!(msg.author_id, author.id);
        assert_eq!(msg.author_name, "Alice");
        assert_eq!(msg.chat_id, chat_id);
        assert!(!msg.is_edited);
        assert!(!msg.is_system());
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_system_message_has_no_author_id() {
        // テスト項目: システムメッセージは作者 ID が空で、作者名が "System"
        // given (前提条件):
        let chat_id = ChatId::new("general".to_string()).unwrap();

        // when (操作):
        let msg = ChatMessage::system(chat_id, "closed".to_string(), Utc::now());

        // then (期待する結果):
        assert!(msg.is_system());
        assert_eq!(msg.author_name, SYSTEM_AUTHOR_NAME);
    }

    #[test]
    fn test_chat_message_wire_format() {
        // テスト項目: シリアライズ結果のフィールド名がワイヤフォーマットと一致する
        // given (前提条件):
        let msg = ChatMessage::new(
            &alice(),
            ChatId::new("general".to_string()).unwrap(),
            "hi".to_string(),
            Utc::now(),
        );

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(value["author_id"], "alice");
        assert_eq!(value["author_name"], "Alice");
        assert_eq!(value["chat_id"], "general");
        assert_eq!(value["content"], "hi");
        assert_eq!(value["is_edited"], false);
        assert!(value["created_at"].is_string());
    }
}
