//! InMemory Message Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    ChatId, ChatMessage, HISTORY_CAPACITY, MessageRepository, MessageUpdate, RepositoryError,
    UserId,
};

/// インメモリ Message Repository 実装
///
/// チャットごとに保存順でメッセージを保持します。
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<ChatId, Vec<ChatMessage>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    /// 作成日時の新しい順に最大 100 件を、古い順に並べて返す
    async fn get_chat_messages(&self, chat_id: &ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut latest = messages.get(chat_id).cloned().unwrap_or_default();
        latest.sort_by_key(|msg| msg.created_at);
        let excess = latest.len().saturating_sub(HISTORY_CAPACITY);
        latest.drain(..excess);
        Ok(latest)
    }

    /// 既に保存済みの ID は無視する
    async fn save_messages(&self, batch: Vec<ChatMessage>) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        for msg in batch {
            let stored = messages.entry(msg.chat_id.clone()).or_default();
            if stored.iter().any(|existing| existing.id == msg.id) {
                tracing::debug!("Message '{}' already stored, skipping", msg.id);
                continue;
            }
            stored.push(msg);
        }
        Ok(())
    }

    async fn update_message_content(
        &self,
        chat_id: &ChatId,
        update: MessageUpdate,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut messages = self.messages.write().await;
        let msg = messages
            .get_mut(chat_id)
            .and_then(|stored| stored.iter_mut().find(|msg| msg.id == update.message_id))
            .ok_or_else(|| RepositoryError::MessageNotFound(update.message_id.clone()))?;

        if msg.author_id != update.author_id {
            return Err(RepositoryError::NotAllowed);
        }
        msg.content = update.content;
        msg.is_edited = true;
        Ok(msg.clone())
    }

    async fn delete_message(
        &self,
        chat_id: &ChatId,
        message_id: &str,
        author_id: &UserId,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        let stored = messages
            .get_mut(chat_id)
            .ok_or_else(|| RepositoryError::MessageNotFound(message_id.to_string()))?;
        let index = stored
            .iter()
            .position(|msg| msg.id == message_id)
            .ok_or_else(|| RepositoryError::MessageNotFound(message_id.to_string()))?;

        if &stored[index].author_id != author_id {
            return Err(RepositoryError::NotAllowed);
        }
        stored.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::User;

    fn alice() -> User {
        User::new(UserId::new("alice".to_string()).unwrap(), "Alice".to_string())
    }

    fn general() -> ChatId {
        ChatId::new("general".to_string()).unwrap()
    }

    fn message_at(secs: i64, content: &str) -> ChatMessage {
        ChatMessage::new(
            &alice(),
            general(),
            content.to_string(),
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_saved_messages_are_returned_chronologically() {
        // テスト項目: 保存したメッセージが作成日時順に返される
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        repo.save_messages(vec![message_at(2, "second"), message_at(1, "first")])
            .await
            .unwrap();

        // when (操作):
        let messages = repo.get_chat_messages(&general()).await.unwrap();

        // then (期待する結果):
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_only_latest_hundred_are_returned() {
        // テスト項目: 100 件を超える場合は最新の 100 件だけが返される
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        let batch = (0..150).map(|i| message_at(i, &format!("m{i}"))).collect();
        repo.save_messages(batch).await.unwrap();

        // when (操作):
        let messages = repo.get_chat_messages(&general()).await.unwrap();

        // then (期待する結果):
        assert_eq!(messages.len(), HISTORY_CAPACITY);
        assert_eq!(messages[0].content, "m50");
        assert_eq!(messages[99].content, "m149");
    }

    #[tokio::test]
    async fn test_resaving_same_message_is_ignored() {
        // テスト項目: 同じ ID のメッセージを再保存しても重複しない
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        let msg = message_at(1, "once");
        repo.save_messages(vec![msg.clone()]).await.unwrap();

        // when (操作):
        repo.save_messages(vec![msg]).await.unwrap();

        // then (期待する結果):
        assert_eq!(repo.get_chat_messages(&general()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_by_author_marks_edited() {
        // テスト項目: 作者本人による更新で内容が変わり、編集済みになる
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        let msg = message_at(1, "helo");
        repo.save_messages(vec![msg.clone()]).await.unwrap();

        // when (操作):
        let updated = repo
            .update_message_content(
                &general(),
                MessageUpdate {
                    message_id: msg.id.clone(),
                    author_id: alice().id,
                    content: "hello".to_string(),
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(updated.content, "hello");
        assert!(updated.is_edited);
        assert_eq!(repo.get_chat_messages(&general()).await.unwrap()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_update_by_other_user_is_not_allowed() {
        // テスト項目: 作者以外による更新は NotAllowed になる
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        let msg = message_at(1, "mine");
        repo.save_messages(vec![msg.clone()]).await.unwrap();

        // when (操作):
        let result = repo
            .update_message_content(
                &general(),
                MessageUpdate {
                    message_id: msg.id,
                    author_id: UserId::new("bob".to_string()).unwrap(),
                    content: "yours".to_string(),
                },
            )
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::NotAllowed));
    }

    #[tokio::test]
    async fn test_delete_missing_message() {
        // テスト項目: 存在しないメッセージの削除は MessageNotFound になる
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();

        // when (操作):
        let result = repo.delete_message(&general(), "nope", &alice().id).await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::MessageNotFound("nope".to_string())));
    }

    #[tokio::test]
    async fn test_delete_by_author() {
        // テスト項目: 作者本人はメッセージを削除できる
        // given (前提条件):
        let repo = InMemoryMessageRepository::new();
        let msg = message_at(1, "oops");
        repo.save_messages(vec![msg.clone()]).await.unwrap();

        // when (操作):
        repo.delete_message(&general(), &msg.id, &alice().id).await.unwrap();

        // then (期待する結果):
        assert!(repo.get_chat_messages(&general()).await.unwrap().is_empty());
    }
}
