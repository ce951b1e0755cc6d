//! Pluggable clock for validity-window checks.

/// Source of the current time for token and delegate validity checks.
///
/// Swap in a fixed implementation for deterministic tests or for
/// "was this valid at time T" style queries.
pub trait TimeProvider: Send + Sync {
    /// Current unix time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// The system clock.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock pinned to a fixed instant (milliseconds since the unix epoch).
pub struct FixedTimeProvider(pub i64);

impl TimeProvider for FixedTimeProvider {
    fn now_ms(&self) -> i64 {
        self.0
    }
}
