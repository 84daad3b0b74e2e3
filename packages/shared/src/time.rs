//! Time-related utilities with clock abstraction for testability.
//!
//! All timestamps are Unix milliseconds. Human-readable renderings use JST.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{FixedOffset, TimeZone, Utc};

/// JST is UTC+9
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Clock that advances by `step` milliseconds on every read.
///
/// Useful when a test needs distinct, ordered timestamps without sleeping.
#[derive(Debug)]
pub struct SteppingClock {
    next: AtomicI64,
    step: i64,
}

impl SteppingClock {
    pub fn new(start_millis: i64, step_millis: i64) -> Self {
        Self {
            next: AtomicI64::new(start_millis),
            step: step_millis,
        }
    }
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> i64 {
        self.next.fetch_add(self.step, Ordering::SeqCst)
    }
}

/// Current Unix timestamp (milliseconds)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to JST RFC 3339 format
///
/// Returns `None` when the timestamp is outside chrono's representable range.
pub fn millis_to_jst_rfc3339(timestamp_millis: i64) -> Option<String> {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS)?;
    jst.timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|dt| dt.to_rfc3339())
}
