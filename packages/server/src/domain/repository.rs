//! Repository trait 定義
//!
//! ドメイン層が必要とする永続化のインターフェースを定義します。
//! UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。

use async_trait::async_trait;

use super::{
    entity::{Chat, ChatMessage, MessageUpdate},
    error::RepositoryError,
    value_object::{ChatId, UserId},
};

/// チャットメタデータの保存先
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 全てのチャットを取得
    async fn get_all_chats(&self) -> Result<Vec<Chat>, RepositoryError>;

    /// ID でチャットを取得（存在しない場合は `ChatNotFound`）
    async fn get_chat_by_id(&self, chat_id: &ChatId) -> Result<Chat, RepositoryError>;

    /// チャットを作成し、その ID を返す
    async fn create_chat(&self, chat: Chat) -> Result<ChatId, RepositoryError>;

    async fn update_chat(&self, chat: Chat) -> Result<(), RepositoryError>;

    async fn delete_chat(&self, chat_id: &ChatId) -> Result<(), RepositoryError>;
}

/// メッセージの保存先
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// チャットの最新メッセージ（最大 100 件）を取得
    ///
    /// 実装によって並び順は異なってよい。呼び出し側で時系列順に正規化する。
    async fn get_chat_messages(&self, chat_id: &ChatId) -> Result<Vec<ChatMessage>, RepositoryError>;

    /// メッセージを追記保存（同じ ID の再保存は無視されることを期待する）
    async fn save_messages(&self, messages: Vec<ChatMessage>) -> Result<(), RepositoryError>;

    /// 作者本人によるメッセージ内容の更新。更新後のメッセージを返す
    async fn update_message_content(
        &self,
        chat_id: &ChatId,
        update: MessageUpdate,
    ) -> Result<ChatMessage, RepositoryError>;

    /// 作者本人によるメッセージの削除
    async fn delete_message(
        &self,
        chat_id: &ChatId,
        message_id: &str,
        author_id: &UserId,
    ) -> Result<(), RepositoryError>;
}
