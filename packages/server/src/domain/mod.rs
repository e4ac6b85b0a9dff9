//! ドメイン層
//!
//! チャットのエンティティ・値オブジェクト、履歴リングバッファ、
//! そして外部コラボレーター（永続化・トランスポート）へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod connection;
pub mod entity;
pub mod error;
pub mod history;
pub mod repository;
pub mod value_object;

pub use connection::{Connection, Frame, FrameSink, FrameStream};
pub use entity::{Chat, ChatMessage, MessageUpdate, User};
pub use error::{ConnectionError, RepositoryError, ValueObjectError};
pub use history::{HISTORY_CAPACITY, HIGH_WATER_MARK, History};
pub use repository::{ChatRepository, MessageRepository};
pub use value_object::{ChatId, UserId};
