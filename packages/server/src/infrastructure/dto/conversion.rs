//! Conversion logic between DTOs and domain entities.

use crate::domain::{Chat, ChatMessage};
use crate::infrastructure::dto::http as dto;

// ========================================
// Domain Entity → DTO
// ========================================

impl From<Chat> for dto::ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id.into_string(),
            name: chat.name,
        }
    }
}

impl From<ChatMessage> for dto::MessageDetail {
    fn from(msg: ChatMessage) -> Self {
        Self {
            id: msg.id,
            author_id: msg.author_id.into_string(),
            author_name: msg.author_name,
            chat_id: msg.chat_id.into_string(),
            content: msg.content,
            is_edited: msg.is_edited,
            created_at: msg.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{ChatId, User, UserId};

    #[test]
    fn test_chat_to_summary() {
        // テスト項目: ドメインの Chat が ChatSummary に変換される
        // given (前提条件):
        let chat = Chat::with_id(ChatId::new("general".to_string()).unwrap(), "General".to_string());

        // when (操作):
        let summary: dto::ChatSummary = chat.into();

        // then (期待する結果):
        assert_eq!(summary.id, "general");
        assert_eq!(summary.name, "General");
    }

    #[test]
    fn test_message_to_detail() {
        // テスト項目: ドメインの ChatMessage が MessageDetail に変換される
        // given (前提条件):
        let author = User::new(UserId::new("bob".to_string()).unwrap(), "Bob".to_string());
        let msg = ChatMessage::new(
            &author,
            ChatId::new("general".to_string()).unwrap(),
            "Hi!".to_string(),
            Utc::now(),
        );
        let id = msg.id.clone();

        // when (操作):
        let detail: dto::MessageDetail = msg.into();

        // then (期待する結果):
        assert_eq!(detail.id, id);
        assert_eq!(detail.author_id, "bob");
        assert_eq!(detail.author_name, "Bob");
        assert_eq!(detail.chat_id, "general");
        assert!(!detail.is_edited);
    }
}
