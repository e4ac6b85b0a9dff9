//! ドメイン層のエラー定義

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("chat id must not be empty")]
    EmptyChatId,
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("chat name must not be empty")]
    EmptyChatName,
}

/// 永続化層から返されるエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("chat '{0}' not found")]
    ChatNotFound(String),
    #[error("message '{0}' not found")]
    MessageNotFound(String),
    #[error("not allowed")]
    NotAllowed,
    #[error("storage error: {0}")]
    Storage(String),
}

/// 双方向コネクションのトランスポートエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}
