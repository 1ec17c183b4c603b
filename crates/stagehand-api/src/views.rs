//! Views of engine state exposed over the control socket

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_util::{ChannelId, GuildId, SessionId};
use std::time::Duration;

/// Counts reported by a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Jobs created for newly-seen qualifying sessions
    pub added: usize,
    /// Jobs dropped because their session no longer qualifies
    pub removed: usize,
    /// Jobs whose fire instant or channel changed in place
    pub updated: usize,
}

/// One tracked activation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub session_id: SessionId,
    pub name: String,
    pub channel: ChannelId,
    /// Start instant announced by the remote platform
    pub starts_at: DateTime<Utc>,
    /// Instant the timer is armed for (post-clamping)
    pub fire_at: DateTime<Utc>,
    pub time_remaining: Duration,
}

/// Snapshot of the engine for the status command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub api_version: u32,
    pub guild: GuildId,
    pub tracked_jobs: usize,
    pub armed_timers: usize,
    pub scheduler_live: bool,
    pub last_reconcile_at: Option<DateTime<Utc>>,
    pub next_fire_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn job_view_round_trip() {
        let view = JobView {
            session_id: SessionId::new("42"),
            name: "Town hall".into(),
            channel: ChannelId::new("7"),
            starts_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            fire_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            time_remaining: Duration::from_secs(90),
        };

        let json = serde_json::to_string(&view).unwrap();
        let parsed: JobView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, view.session_id);
        assert_eq!(parsed.time_remaining, view.time_remaining);
    }

    #[test]
    fn reconcile_outcome_defaults_to_zero() {
        let outcome = ReconcileOutcome::default();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.updated, 0);
    }
}
