//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::usecase::ChatGateway;

use super::{
    handler::{debug_presence, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket direct-message gateway server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(gateway);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// ChatGateway（接続・送信・既読のユースケース）
    gateway: Arc<ChatGateway>,
}

impl Server {
    pub fn new(gateway: Arc<ChatGateway>) -> Self {
        Self { gateway }
    }

    /// Build the router with every endpoint
    ///
    /// Exposed separately from [`Server::run`] so callers can serve it on
    /// their own listener.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            gateway: self.gateway.clone(),
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/debug/presence", get(debug_presence))
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the gateway until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("DM gateway listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws?user_id=<user>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
