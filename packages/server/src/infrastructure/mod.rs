//! Infrastructure 層
//!
//! Domain 層が定義する trait の具体的な実装（インメモリのストア、WebSocket トランスポート）
//! と、外部とやり取りするための DTO を提供します。

pub mod dto;
pub mod repository;
pub mod transport;
