//! InMemory Repository 実装
//!
//! プロセス内の HashMap をストアとして使用します。再起動でデータは失われます。

mod chat;
mod message;

pub use chat::InMemoryChatRepository;
pub use message::InMemoryMessageRepository;
