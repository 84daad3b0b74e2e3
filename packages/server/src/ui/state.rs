//! Server state.

use std::sync::Arc;

use crate::usecase::ChatGateway;

/// Shared application state
pub struct AppState {
    /// ChatGateway（全ての接続操作の入口）
    pub gateway: Arc<ChatGateway>,
}
