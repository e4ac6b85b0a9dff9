//! Data Transfer Objects (DTOs) for the chat server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: inbound WebSocket payloads
//! - `http`: HTTP API request and response bodies

pub mod conversion;
pub mod http;
pub mod websocket;
