//! Hiroba chat server
//!
//! Multi-room real-time chat: each active chat runs a room that fans out
//! messages to its connected clients, keeps a ring of recent history and
//! flushes it to the message store.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

#[cfg(test)]
mod test_support;
