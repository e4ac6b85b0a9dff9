//! WebSocket connection handler.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, ws::WebSocketUpgrade},
    response::IntoResponse,
};

use crate::{
    domain::{ChatId, User, UserId},
    infrastructure::{dto::http::ConnectQuery, transport::WebSocketConnection},
    ui::state::AppState,
    usecase::{ChatServiceError, SessionError},
};

use super::error::ApiError;

/// Resolve the chat, then upgrade and run the session until it ends.
///
/// Unknown chats are rejected with 404 before the upgrade.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = ChatId::new(chat_id)?;
    let user = User::new(UserId::new(query.user_id)?, query.username);
    let chat = state.chat_service.get_chat(&chat_id).await?;

    tracing::info!("User '{}' connecting to chat '{}'", user.id, chat.id);
    let max_message_size = state.chat_service.config().session.max_message_size;

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| async move {
            let connection = WebSocketConnection::new(socket);
            match state.chat_service.join(chat, user, connection).await {
                Ok(()) => tracing::debug!("Connection closed by client"),
                Err(ChatServiceError::Session(SessionError::RoomClosed)) => {
                    tracing::debug!("Connection closed by room shutdown")
                }
                Err(e) => tracing::info!("Connection ended: {}", e),
            }
        }))
}
