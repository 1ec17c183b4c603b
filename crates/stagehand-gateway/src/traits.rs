//! Session gateway trait

use async_trait::async_trait;
use stagehand_util::{GuildId, SessionId};
use std::time::Duration;
use thiserror::Error;

use crate::Session;

/// Errors from remote gateway operations
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport or upstream failure; worth retrying later
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// The remote side rejected the call outright; a configuration problem
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The session no longer exists on the remote side
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// Throttled by the remote side
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The remote side answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::RateLimited { .. })
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Read/write access to the remote platform's scheduled sessions.
///
/// Implementations must make `activate_session` and `end_session` idempotent
/// from the engine's perspective: a call against a session that has already
/// reached the requested state returns `Ok(())`, not an error, since the
/// remote state may have changed concurrently.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Fetch the full current session list for the guild, all statuses.
    async fn list_scheduled_sessions(&self, guild: &GuildId) -> GatewayResult<Vec<Session>>;

    /// Transition a session to `Active`.
    async fn activate_session(&self, guild: &GuildId, session: &SessionId) -> GatewayResult<()>;

    /// Force-end a session (transition to `Completed`).
    async fn end_session(&self, guild: &GuildId, session: &SessionId) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Unavailable("boom".into()).is_transient());
        assert!(GatewayError::RateLimited { retry_after: None }.is_transient());
        assert!(!GatewayError::PermissionDenied("nope".into()).is_transient());
        assert!(!GatewayError::NotFound(SessionId::new("1")).is_transient());
        assert!(!GatewayError::Protocol("garbage".into()).is_transient());
    }
}
