//! Direct-message gateway library.
//!
//! This library tracks which users have live WebSocket connections, persists
//! direct messages before delivering them to every live connection of the
//! receiver, and propagates read receipts back to the original sender.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
