//! Fixed session representation
//!
//! The remote API hands back loosely-typed records; adapters parse them into
//! these tagged types at the boundary so the engine never operates on
//! untyped data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_util::{ChannelId, GuildId, SessionId};

/// Lifecycle status of a scheduled session, as reported by the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
    Canceled,
    /// Status code this build does not know about; never automated
    Other,
}

/// What kind of remote entity hosts the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Voice,
    Stage,
    /// External location or an entity kind this build does not know about
    Other,
}

impl EntityKind {
    /// Only sessions hosted in a voice or stage channel can be automated.
    pub fn is_voice_like(&self) -> bool {
        matches!(self, EntityKind::Voice | EntityKind::Stage)
    }
}

/// A scheduled session as seen on the remote platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub guild: GuildId,
    pub name: String,
    /// Bound channel; absent for external-location sessions
    pub channel: Option<ChannelId>,
    pub starts_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub kind: EntityKind,
}

impl Session {
    /// Whether this session should be tracked by the job table:
    /// voice/stage entity, still `Scheduled`, with a channel to activate in.
    pub fn qualifies(&self) -> bool {
        self.kind.is_voice_like() && self.status == SessionStatus::Scheduled && self.channel.is_some()
    }

    /// Whether this session currently occupies its channel.
    pub fn is_live(&self) -> bool {
        self.kind.is_voice_like() && self.status == SessionStatus::Active && self.channel.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(status: SessionStatus, kind: EntityKind, channel: Option<&str>) -> Session {
        Session {
            id: SessionId::new("1"),
            guild: GuildId::new("g"),
            name: "Weekly sync".into(),
            channel: channel.map(ChannelId::new),
            starts_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            status,
            kind,
        }
    }

    #[test]
    fn scheduled_voice_session_qualifies() {
        assert!(session(SessionStatus::Scheduled, EntityKind::Voice, Some("c")).qualifies());
        assert!(session(SessionStatus::Scheduled, EntityKind::Stage, Some("c")).qualifies());
    }

    #[test]
    fn non_voice_or_non_scheduled_does_not_qualify() {
        assert!(!session(SessionStatus::Scheduled, EntityKind::Other, Some("c")).qualifies());
        assert!(!session(SessionStatus::Active, EntityKind::Voice, Some("c")).qualifies());
        assert!(!session(SessionStatus::Canceled, EntityKind::Stage, Some("c")).qualifies());
        assert!(!session(SessionStatus::Scheduled, EntityKind::Voice, None).qualifies());
    }

    #[test]
    fn live_means_active_in_a_channel() {
        assert!(session(SessionStatus::Active, EntityKind::Stage, Some("c")).is_live());
        assert!(!session(SessionStatus::Active, EntityKind::Voice, None).is_live());
        assert!(!session(SessionStatus::Completed, EntityKind::Voice, Some("c")).is_live());
    }

    #[test]
    fn session_serializes_round_trip() {
        let s = session(SessionStatus::Scheduled, EntityKind::Voice, Some("c"));
        let json = serde_json::to_string(&s).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(s, parsed);
    }
}
