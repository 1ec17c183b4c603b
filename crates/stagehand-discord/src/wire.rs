//! Wire records for the scheduled-events REST API

use chrono::{DateTime, Utc};
use serde::Deserialize;
use stagehand_gateway::{EntityKind, Session, SessionStatus};
use stagehand_util::{ChannelId, GuildId, SessionId};

/// Scheduled event as the remote API serializes it.
///
/// Unknown status and entity-type codes are kept (not rejected) and map to
/// the `Other` variants, so a new remote feature never breaks listing.
#[derive(Debug, Clone, Deserialize)]
pub struct WireScheduledEvent {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub channel_id: Option<String>,
    pub scheduled_start_time: DateTime<Utc>,
    pub status: u8,
    pub entity_type: u8,
}

/// Remote status codes
const STATUS_SCHEDULED: u8 = 1;
const STATUS_ACTIVE: u8 = 2;
const STATUS_COMPLETED: u8 = 3;
const STATUS_CANCELED: u8 = 4;

/// Remote entity-type codes
const ENTITY_STAGE: u8 = 1;
const ENTITY_VOICE: u8 = 2;

pub(crate) fn parse_status(code: u8) -> SessionStatus {
    match code {
        STATUS_SCHEDULED => SessionStatus::Scheduled,
        STATUS_ACTIVE => SessionStatus::Active,
        STATUS_COMPLETED => SessionStatus::Completed,
        STATUS_CANCELED => SessionStatus::Canceled,
        _ => SessionStatus::Other,
    }
}

pub(crate) fn parse_entity_kind(code: u8) -> EntityKind {
    match code {
        ENTITY_STAGE => EntityKind::Stage,
        ENTITY_VOICE => EntityKind::Voice,
        _ => EntityKind::Other,
    }
}

impl WireScheduledEvent {
    pub fn into_session(self) -> Session {
        Session {
            id: SessionId::new(self.id),
            guild: GuildId::new(self.guild_id),
            name: self.name,
            channel: self.channel_id.map(ChannelId::new),
            starts_at: self.scheduled_start_time,
            status: parse_status(self.status),
            kind: parse_entity_kind(self.entity_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_voice_event() {
        let json = r#"{
            "id": "1021",
            "guild_id": "77",
            "name": "Community call",
            "channel_id": "555",
            "scheduled_start_time": "2025-06-01T18:00:00+00:00",
            "status": 1,
            "entity_type": 2,
            "creator_id": "12",
            "description": "monthly call"
        }"#;

        let wire: WireScheduledEvent = serde_json::from_str(json).unwrap();
        let session = wire.into_session();

        assert_eq!(session.id, SessionId::new("1021"));
        assert_eq!(session.channel, Some(ChannelId::new("555")));
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert_eq!(session.kind, EntityKind::Voice);
        assert!(session.qualifies());
    }

    #[test]
    fn parses_an_external_event_without_channel() {
        let json = r#"{
            "id": "1022",
            "guild_id": "77",
            "name": "Offsite",
            "channel_id": null,
            "scheduled_start_time": "2025-06-02T09:00:00Z",
            "status": 1,
            "entity_type": 3
        }"#;

        let wire: WireScheduledEvent = serde_json::from_str(json).unwrap();
        let session = wire.into_session();

        assert_eq!(session.channel, None);
        assert_eq!(session.kind, EntityKind::Other);
        assert!(!session.qualifies());
    }

    #[test]
    fn unknown_codes_map_to_other() {
        assert_eq!(parse_status(0), SessionStatus::Other);
        assert_eq!(parse_status(9), SessionStatus::Other);
        assert_eq!(parse_entity_kind(7), EntityKind::Other);
    }

    #[test]
    fn status_codes_map_onto_lifecycle() {
        assert_eq!(parse_status(1), SessionStatus::Scheduled);
        assert_eq!(parse_status(2), SessionStatus::Active);
        assert_eq!(parse_status(3), SessionStatus::Completed);
        assert_eq!(parse_status(4), SessionStatus::Canceled);
        assert_eq!(parse_entity_kind(1), EntityKind::Stage);
        assert_eq!(parse_entity_kind(2), EntityKind::Voice);
    }
}
