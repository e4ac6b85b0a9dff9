//! Request handlers.

mod error;
mod http;
mod websocket;

pub use http::{
    create_chat, delete_message, get_active_chats, get_chats, get_messages, health_check,
    update_message,
};
pub use websocket::websocket_handler;
