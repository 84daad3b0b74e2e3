//! MessageRepository の実装
//!
//! - `inmemory`: インメモリ実装
//! - 将来的に: `postgres` など

pub mod inmemory;

pub use inmemory::InMemoryMessageRepository;
