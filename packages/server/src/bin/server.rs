//! Multi-room WebSocket chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --chat general --chat random
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use hiroba_server::{
    config::ChatConfig,
    domain::Chat,
    infrastructure::repository::{InMemoryChatRepository, InMemoryMessageRepository},
    ui::Server,
    usecase::ChatService,
};
use hiroba_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Multi-room WebSocket chat server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "debug")]
    log_level: String,

    /// Seconds between periodic history flushes
    #[arg(long, default_value_t = 600)]
    flush_interval_secs: u64,

    /// Seconds between idle room sweeps
    #[arg(long, default_value_t = 3600)]
    idle_check_secs: u64,

    /// Chat to create at startup (repeatable)
    #[arg(long = "chat")]
    chats: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Initialize dependencies in order:
    // 1. Repositories
    // 2. ChatService
    // 3. Server

    // 1. Create Repositories (in-memory stores)
    let chat_repository = Arc::new(InMemoryChatRepository::new());
    let message_repository = Arc::new(InMemoryMessageRepository::new());

    // 2. Create ChatService
    let config = ChatConfig {
        flush_interval: Duration::from_secs(args.flush_interval_secs),
        idle_check_interval: Duration::from_secs(args.idle_check_secs),
        ..ChatConfig::default()
    };
    let chat_service = ChatService::new(
        chat_repository,
        message_repository,
        Arc::new(SystemClock),
        config,
    );

    for name in args.chats {
        let created = match Chat::new(name.clone()) {
            Ok(chat) => chat_service.create_chat(chat).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match created {
            Ok(chat_id) => tracing::info!("Chat '{}' created with id {}", name, chat_id),
            Err(e) => tracing::warn!("Failed to create chat '{}': {}", name, e),
        }
    }

    // 3. Create and run the server
    let server = Server::new(Arc::clone(&chat_service));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        chat_service.shutdown().await;
        std::process::exit(1);
    }
}
