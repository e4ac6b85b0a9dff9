//! Server state.

use std::sync::Arc;

use crate::usecase::ChatService;

/// Shared application state
pub struct AppState {
    /// ChatService（ルームの登録・接続・メッセージ操作）
    pub chat_service: Arc<ChatService>,
}
