//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::{Chat, ChatId, MessageUpdate, UserId},
    infrastructure::dto::http::{
        ChatSummary, CreateChatRequest, CreateChatResponse, DeleteMessageQuery, MessageDetail,
        UpdateMessageRequest,
    },
    ui::state::AppState,
};

use super::error::ApiError;

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Create a chat and start its room
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<CreateChatResponse>), ApiError> {
    let chat = Chat::new(request.name)?;
    let chat_id = state.chat_service.create_chat(chat).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            id: chat_id.into_string(),
        }),
    ))
}

/// List every stored chat
pub async fn get_chats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    let chats = state.chat_service.get_all_chats().await?;
    Ok(Json(chats.into_iter().map(ChatSummary::from).collect()))
}

/// List chats with a running room
pub async fn get_active_chats(State(state): State<Arc<AppState>>) -> Json<Vec<ChatSummary>> {
    let chats = state.chat_service.get_active_chats().await;
    Json(chats.into_iter().map(ChatSummary::from).collect())
}

/// Stored messages of a chat, oldest first
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<MessageDetail>>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let messages = state.chat_service.get_messages(&chat_id).await?;
    Ok(Json(messages.into_iter().map(MessageDetail::from).collect()))
}

/// Edit a message (author only)
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Path((chat_id, message_id)): Path<(String, String)>,
    Json(request): Json<UpdateMessageRequest>,
) -> Result<Json<MessageDetail>, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let update = MessageUpdate {
        message_id,
        author_id: UserId::new(request.author_id)?,
        content: request.content,
    };
    let updated = state.chat_service.update_message(&chat_id, update).await?;
    Ok(Json(updated.into()))
}

/// Delete a message (author only)
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path((chat_id, message_id)): Path<(String, String)>,
    Query(query): Query<DeleteMessageQuery>,
) -> Result<StatusCode, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let author_id = UserId::new(query.author_id)?;
    state
        .chat_service
        .delete_message(&chat_id, &message_id, &author_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
