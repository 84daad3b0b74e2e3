//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// One user's live connections, as reported by `/debug/presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntryDto {
    pub user_id: String,
    pub connection_ids: Vec<String>,
}
