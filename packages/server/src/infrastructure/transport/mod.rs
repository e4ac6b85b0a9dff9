//! トランスポートアダプター
//!
//! upgrade 済みのトランスポートをドメインの `Connection` に変換します。

pub mod websocket;

pub use websocket::WebSocketConnection;
