//! HTTP API DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /api/v1/chats` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub name: String,
}

/// `POST /api/v1/chats` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDetail {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub chat_id: String,
    pub content: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

/// `PATCH /api/v1/chats/{chat_id}/messages/{message_id}` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessageRequest {
    pub author_id: String,
    pub content: String,
}

/// `DELETE /api/v1/chats/{chat_id}/messages/{message_id}` query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessageQuery {
    pub author_id: String,
}

/// `GET /api/v1/chats/{chat_id}/connect` query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
