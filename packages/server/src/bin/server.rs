//! WebSocket direct-message gateway.
//!
//! Tracks which users are online, persists direct messages before pushing
//! them to every live connection of the receiver, and propagates read receipts.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin dengon-server
//! cargo run --bin dengon-server -- --host 0.0.0.0 --port 3000 --log-level info
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use dengon_server::{
    domain::MessagePolicy,
    infrastructure::{
        message_pusher::WebSocketMessagePusher, presence::InMemoryPresenceRegistry,
        repository::InMemoryMessageRepository,
    },
    ui::Server,
    usecase::{ChatGateway, GatewayConfig},
};
use dengon_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "dengon-server")]
#[command(about = "WebSocket direct-message gateway with presence and read receipts", long_about = None)]
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

    /// Maximum number of characters in a message body
    #[arg(long, default_value_t = MessagePolicy::DEFAULT_MAX_BODY_CHARS)]
    max_body_chars: usize,

    /// Upper bound for a single message store call, in milliseconds
    #[arg(long, default_value = "5000")]
    store_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Initialize dependencies in order:
    // 1. PresenceRegistry / Repository
    // 2. MessagePusher
    // 3. ChatGateway
    // 4. Server

    // 1. In-memory presence and message store
    let presence = Arc::new(InMemoryPresenceRegistry::new());
    let repository = Arc::new(InMemoryMessageRepository::new());

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create the gateway
    let config = GatewayConfig {
        policy: MessagePolicy::new(args.max_body_chars),
        store_timeout: Duration::from_millis(args.store_timeout_ms),
    };
    tracing::info!(
        "Gateway config: max_body_chars={}, store_timeout={:?}",
        config.policy.max_body_chars,
        config.store_timeout
    );
    let gateway = Arc::new(ChatGateway::new(
        presence,
        repository,
        message_pusher,
        Arc::new(SystemClock),
        config,
    ));

    // 4. Create and run the server
    let server = Server::new(gateway);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
