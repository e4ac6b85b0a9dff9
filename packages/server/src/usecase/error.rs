//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{ConnectionError, RepositoryError, ValueObjectError};

/// クライアントへのメッセージ送信時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("client not available")]
    ClientUnavailable,
    #[error("client mailbox is full")]
    MailboxFull,
}

/// クライアントセッションの終了理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// ルームが停止し、メールボックスが閉じられた
    #[error("room closed")]
    RoomClosed,
    /// ping を送信できなかった
    #[error("client not available")]
    ClientUnavailable,
    /// サーバー側からセッションが閉じられた（kick）
    #[error("session closed")]
    Closed,
    #[error("read message: {0}")]
    Read(ConnectionError),
    #[error("write message: {0}")]
    Write(ConnectionError),
    #[error("read deadline exceeded")]
    ReadTimeout,
    #[error("write deadline exceeded")]
    WriteTimeout,
}

/// ルーム操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room closed")]
    Closed,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// ChatService のエラー
///
/// 呼び出し側が Repository のエラーを知らなくて済むよう変換して返す。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatServiceError {
    #[error("chat '{0}' not found")]
    ChatNotFound(String),
    #[error("message '{0}' not found")]
    MessageNotFound(String),
    #[error("not allowed")]
    NotAllowed,
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValueObjectError),
    #[error("room closed")]
    RoomClosed,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl ChatServiceError {
    /// Repository のエラーを変換する（想定外の失敗は操作名付きで包む）
    pub(crate) fn from_repository(operation: &'static str, err: RepositoryError) -> Self {
        match err {
            RepositoryError::ChatNotFound(id) => Self::ChatNotFound(id),
            RepositoryError::MessageNotFound(id) => Self::MessageNotFound(id),
            RepositoryError::NotAllowed => Self::NotAllowed,
            source @ RepositoryError::Storage(_) => Self::Persistence { operation, source },
        }
    }

    pub(crate) fn from_room(operation: &'static str, err: RoomError) -> Self {
        match err {
            RoomError::Closed => Self::RoomClosed,
            RoomError::Repository(err) => Self::from_repository(operation, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_is_remapped() {
        // テスト項目: リポジトリの ChatNotFound はサービスの ChatNotFound に変換される
        // given (前提条件):
        let err = RepositoryError::ChatNotFound("general".to_string());

        // when (操作):
        let mapped = ChatServiceError::from_repository("get chat", err);

        // then (期待する結果):
        assert_eq!(mapped, ChatServiceError::ChatNotFound("general".to_string()));
    }

    #[test]
    fn test_storage_error_is_wrapped_with_operation() {
        // テスト項目: ストレージエラーは操作名付きでラップされる
        // given (前提条件):
        let err = RepositoryError::Storage("disk full".to_string());

        // when (操作):
        let mapped = ChatServiceError::from_repository("save messages", err);

        // then (期待する結果):
        assert_eq!(mapped.to_string(), "save messages: storage error: disk full");
        assert!(matches!(mapped, ChatServiceError::Persistence { .. }));
    }

    #[test]
    fn test_room_closed_is_remapped() {
        // テスト項目: RoomError::Closed は ChatServiceError::RoomClosed に変換される
        // given (前提条件):
        let err = RoomError::Closed;

        // when (操作):
        let mapped = ChatServiceError::from_room("update message", err);

        // then (期待する結果):
        assert_eq!(mapped, ChatServiceError::RoomClosed);
    }
}
