//! UseCase 層
//!
//! チャットルームのランタイム（クライアントセッション、ルーム、サービス）を実装します。
//! 永続化とトランスポートには Domain 層の trait を通してのみアクセスします。

pub mod chat_service;
pub mod client;
pub mod error;
pub mod room;

pub use chat_service::ChatService;
pub use client::{Client, PreparedMessage, SessionState};
pub use error::{ChatServiceError, ClientError, RoomError, SessionError};
pub use room::Room;
