//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};
use tower_http::trace::TraceLayer;

use crate::usecase::ChatService;

use super::{
    handler::{
        create_chat, delete_message, get_active_chats, get_chats, get_messages, health_check,
        update_message, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(chat_service);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    chat_service: Arc<ChatService>,
}

impl Server {
    pub fn new(chat_service: Arc<ChatService>) -> Self {
        Self { chat_service }
    }

    /// HTTP and WebSocket routes
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            chat_service: Arc::clone(&self.chat_service),
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/api/v1/chats/{chat_id}/connect", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/v1/chats", get(get_chats).post(create_chat))
            .route("/api/v1/chats/active", get(get_active_chats))
            .route("/api/v1/chats/{chat_id}/messages", get(get_messages))
            .route(
                "/api/v1/chats/{chat_id}/messages/{message_id}",
                patch(update_message).delete(delete_message),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve until a shutdown signal arrives. Rooms are stopped first so
    /// that open WebSocket sessions end before the server drains.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();
        let chat_service = Arc::clone(&self.chat_service);

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!(
            "Connect to: ws://{}/api/v1/chats/{{chat_id}}/connect?user_id=...&username=...",
            bind_addr
        );
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                chat_service.shutdown().await;
            })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
