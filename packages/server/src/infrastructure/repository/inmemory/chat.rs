//! InMemory Chat Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Chat, ChatId, ChatRepository, RepositoryError};

/// インメモリ Chat Repository 実装
#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: RwLock<HashMap<ChatId, Chat>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 初期データ付きで作成
    pub fn with_chats(chats: impl IntoIterator<Item = Chat>) -> Self {
        let chats = chats
            .into_iter()
            .map(|chat| (chat.id.clone(), chat))
            .collect();
        Self {
            chats: RwLock::new(chats),
        }
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn get_all_chats(&self) -> Result<Vec<Chat>, RepositoryError> {
        let chats = self.chats.read().await;
        let mut all: Vec<Chat> = chats.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn get_chat_by_id(&self, chat_id: &ChatId) -> Result<Chat, RepositoryError> {
        let chats = self.chats.read().await;
        chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| RepositoryError::ChatNotFound(chat_id.to_string()))
    }

    async fn create_chat(&self, chat: Chat) -> Result<ChatId, RepositoryError> {
        let mut chats = self.chats.write().await;
        if chats.contains_key(&chat.id) {
            return Err(RepositoryError::Storage(format!(
                "chat '{}' already exists",
                chat.id
            )));
        }
        let chat_id = chat.id.clone();
        chats.insert(chat_id.clone(), chat);
        Ok(chat_id)
    }

    async fn update_chat(&self, chat: Chat) -> Result<(), RepositoryError> {
        let mut chats = self.chats.write().await;
        match chats.get_mut(&chat.id) {
            Some(stored) => {
                *stored = chat;
                Ok(())
            }
            None => Err(RepositoryError::ChatNotFound(chat.id.to_string())),
        }
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> Result<(), RepositoryError> {
        let mut chats = self.chats.write().await;
        chats
            .remove(chat_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::ChatNotFound(chat_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str, name: &str) -> Chat {
        Chat::with_id(ChatId::new(id.to_string()).unwrap(), name.to_string())
    }

    #[tokio::test]
    async fn test_create_and_get_chat() {
        // テスト項目: 作成したチャットを ID で取得できる
        // given (前提条件):
        let repo = InMemoryChatRepository::new();

        // when (操作):
        let chat_id = repo.create_chat(chat("general", "General")).await.unwrap();

        // then (期待する結果):
        assert_eq!(chat_id.as_str(), "general");
        let stored = repo.get_chat_by_id(&chat_id).await.unwrap();
        assert_eq!(stored.name, "General");
    }

    #[tokio::test]
    async fn test_get_missing_chat() {
        // テスト項目: 存在しないチャットの取得は ChatNotFound になる
        // given (前提条件):
        let repo = InMemoryChatRepository::new();
        let chat_id = ChatId::new("missing".to_string()).unwrap();

        // when (操作):
        let result = repo.get_chat_by_id(&chat_id).await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::ChatNotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_create_duplicate_chat_fails() {
        // テスト項目: 同じ ID のチャットは二重に作成できない
        // given (前提条件):
        let repo = InMemoryChatRepository::with_chats([chat("general", "General")]);

        // when (操作):
        let result = repo.create_chat(chat("general", "Other")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(RepositoryError::Storage(_))));
        assert_eq!(repo.get_all_chats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_all_chats_sorted_by_name() {
        // テスト項目: 全チャットは名前順で返される
        // given (前提条件):
        let repo = InMemoryChatRepository::with_chats([
            chat("2", "random"),
            chat("1", "general"),
        ]);

        // when (操作):
        let chats = repo.get_all_chats().await.unwrap();

        // then (期待する結果):
        let names: Vec<&str> = chats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["general", "random"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_chat() {
        // テスト項目: チャットの更新・削除ができ、削除後は ChatNotFound になる
        // given (前提条件):
        let repo = InMemoryChatRepository::with_chats([chat("general", "General")]);
        let chat_id = ChatId::new("general".to_string()).unwrap();

        // when (操作):
        repo.update_chat(chat("general", "Lobby")).await.unwrap();
        let renamed = repo.get_chat_by_id(&chat_id).await.unwrap();
        repo.delete_chat(&chat_id).await.unwrap();

        // then (期待する結果):
        assert_eq!(renamed.name, "Lobby");
        assert!(matches!(
            repo.delete_chat(&chat_id).await,
            Err(RepositoryError::ChatNotFound(_))
        ));
    }
}
