//! Time helpers.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Horizon used when a deadline is too far out to represent.
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Milliseconds since the Unix epoch. Returns `0` if the system clock is set
/// before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// `from + delay`, clamped to [`FAR_FUTURE`] past `from` when the sum is not
/// representable.
#[must_use]
pub fn saturating_deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}
