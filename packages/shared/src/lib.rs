//! Utilities shared by the Dengon binaries and their tests.

pub mod logger;
pub mod time;
