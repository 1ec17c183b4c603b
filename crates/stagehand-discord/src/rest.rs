//! REST gateway implementation

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use stagehand_gateway::{GatewayError, GatewayResult, Session, SessionGateway, SessionStatus};
use stagehand_util::{GuildId, SessionId};
use std::time::Duration;
use tracing::{debug, warn};

use crate::WireScheduledEvent;

/// Status transition requested via PATCH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetStatus {
    Active,
    Completed,
}

impl TargetStatus {
    pub(crate) fn code(self) -> u8 {
        match self {
            TargetStatus::Active => 2,
            TargetStatus::Completed => 3,
        }
    }

    /// Whether a session already in `current` makes this transition moot.
    /// An already-finished session satisfies an end request whichever way
    /// it finished.
    pub(crate) fn satisfied_by(self, current: SessionStatus) -> bool {
        match self {
            TargetStatus::Active => matches!(current, SessionStatus::Active),
            TargetStatus::Completed => {
                matches!(current, SessionStatus::Completed | SessionStatus::Canceled)
            }
        }
    }
}

/// `SessionGateway` over the platform's guild scheduled-events REST API
pub struct DiscordGateway {
    http: Client,
    api_base: String,
    token: String,
}

impl DiscordGateway {
    /// `api_base` without a trailing slash, e.g. `https://discord.com/api/v10`.
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        request_timeout: Duration,
    ) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("HTTP client init: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            token: bot_token.into(),
        })
    }

    fn events_url(&self, guild: &GuildId) -> String {
        format!("{}/guilds/{}/scheduled-events", self.api_base, guild)
    }

    fn event_url(&self, guild: &GuildId, session: &SessionId) -> String {
        format!("{}/{}", self.events_url(guild), session)
    }

    fn auth_value(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn fetch_event(&self, guild: &GuildId, session: &SessionId) -> GatewayResult<Session> {
        let response = self
            .http
            .get(self.event_url(guild, session))
            .header("Authorization", self.auth_value())
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_response(&response, Some(session)));
        }

        let wire: WireScheduledEvent = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        Ok(wire.into_session())
    }

    async fn patch_status(
        &self,
        guild: &GuildId,
        session: &SessionId,
        target: TargetStatus,
    ) -> GatewayResult<()> {
        let response = self
            .http
            .patch(self.event_url(guild, session))
            .header("Authorization", self.auth_value())
            .json(&serde_json::json!({ "status": target.code() }))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(session_id = %session, target = target.code(), "Status transition accepted");
            return Ok(());
        }

        let err = classify_response(&response, Some(session));
        if status == StatusCode::BAD_REQUEST {
            // The remote rejects transitions that already happened. Check the
            // live state: if it satisfies the request, someone else got there
            // first and that counts as success.
            match self.fetch_event(guild, session).await {
                Ok(current) if target.satisfied_by(current.status) => {
                    debug!(
                        session_id = %session,
                        status = ?current.status,
                        "Transition already satisfied remotely"
                    );
                    return Ok(());
                }
                Ok(current) => {
                    return Err(GatewayError::Protocol(format!(
                        "transition to {} rejected for session in status {:?}",
                        target.code(),
                        current.status
                    )));
                }
                Err(fetch_err) => {
                    warn!(
                        session_id = %session,
                        error = %fetch_err,
                        "Could not verify rejected transition"
                    );
                    return Err(fetch_err);
                }
            }
        }

        Err(err)
    }
}

#[async_trait]
impl SessionGateway for DiscordGateway {
    async fn list_scheduled_sessions(&self, guild: &GuildId) -> GatewayResult<Vec<Session>> {
        let response = self
            .http
            .get(self.events_url(guild))
            .header("Authorization", self.auth_value())
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_response(&response, None));
        }

        let wire: Vec<WireScheduledEvent> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        debug!(guild = %guild, count = wire.len(), "Fetched scheduled sessions");
        Ok(wire.into_iter().map(WireScheduledEvent::into_session).collect())
    }

    async fn activate_session(&self, guild: &GuildId, session: &SessionId) -> GatewayResult<()> {
        self.patch_status(guild, session, TargetStatus::Active).await
    }

    async fn end_session(&self, guild: &GuildId, session: &SessionId) -> GatewayResult<()> {
        self.patch_status(guild, session, TargetStatus::Completed).await
    }
}

/// Map an error response onto the gateway taxonomy.
fn classify_response(response: &Response, session: Option<&SessionId>) -> GatewayError {
    classify_status(response.status(), retry_after(response), session)
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    session: Option<&SessionId>,
) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::PermissionDenied(format!("remote returned {}", status))
        }
        StatusCode::NOT_FOUND => match session {
            Some(id) => GatewayError::NotFound(id.clone()),
            None => GatewayError::Protocol("listing endpoint not found".into()),
        },
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after },
        s if s.is_server_error() => GatewayError::Unavailable(format!("remote returned {}", s)),
        s => GatewayError::Protocol(format!("unexpected status {}", s)),
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
}
