//! PresenceRegistry の実装
//!
//! - `inmemory`: プロセスローカルな HashMap 実装

pub mod inmemory;

pub use inmemory::InMemoryPresenceRegistry;
