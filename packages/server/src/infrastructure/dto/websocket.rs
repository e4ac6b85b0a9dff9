//! WebSocket message DTOs.
//!
//! Outbound frames carry a serialized `ChatMessage` (or a JSON array of them
//! for the history snapshot sent on join). Inbound frames carry only the
//! message text; author, chat and timestamp are filled in by the server.

use serde::{Deserialize, Serialize};

/// Inbound chat message sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub content: String,
}
