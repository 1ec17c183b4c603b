//! Time helpers for stagehand
//!
//! Remote start instants are UTC wall-clock times. Timers are armed from a
//! delay computed against the local clock, so a session whose start instant
//! has already elapsed must be clamped forward rather than fired immediately:
//! a cold-start reconciliation over a backlog of past-due sessions would
//! otherwise activate all of them in the same instant.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default minimum lookahead applied to past-due fire instants.
pub const MIN_LOOKAHEAD: Duration = Duration::from_secs(60);

/// Clamp a fire instant so it is never in the past.
///
/// A future instant is returned unchanged. An instant at or before `now`
/// is moved to `now + lookahead`.
pub fn clamp_fire_instant(
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
    lookahead: Duration,
) -> DateTime<Utc> {
    if starts_at > now {
        starts_at
    } else {
        now + chrono::Duration::from_std(lookahead).unwrap_or(chrono::Duration::seconds(60))
    }
}

/// Duration from `now` until `instant`, zero if already elapsed.
pub fn duration_until(instant: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    instant
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
