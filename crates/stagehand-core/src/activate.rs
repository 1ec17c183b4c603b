//! Conflict resolution and the activation worker
//!
//! Channel occupancy drives a destructive action (force-ending someone
//! else's live session), so it is always computed from a snapshot fetched
//! at fire time, never from the reconciler's cache.

use stagehand_gateway::{GatewayError, SessionGateway as _};
use stagehand_util::{ChannelId, SessionId};
use tracing::{debug, error, info, warn};

use crate::{Engine, EngineError, EngineResult};

/// Outcome of a successful activation
#[derive(Debug, Clone)]
pub struct ActivationReport {
    pub session_id: SessionId,
    pub channel: ChannelId,
    /// Conflicting live sessions that were ended (or found already gone)
    pub ended_conflicts: Vec<SessionId>,
    /// Best-effort conflict cleanup failures; never fatal
    pub warnings: Vec<String>,
}

/// What a single activation attempt found
enum Attempt {
    Activated(ActivationReport),
    /// The session was externally started, canceled, or deleted between
    /// scheduling and firing
    Vanished,
}

impl Engine {
    /// Activate a session now, resolving channel conflicts first. This is
    /// the operator path; fired timers go through `run_fired_job`.
    ///
    /// Validates against the live remote list rather than the job table, so
    /// sessions the reconciler has not seen yet can still be forced.
    pub async fn activate_now(&self, session_id: &SessionId) -> EngineResult<ActivationReport> {
        match self.activate_with_retry(session_id).await? {
            Attempt::Activated(report) => {
                // The session is live; any pending timer for it is obsolete.
                self.remove_job(session_id).await;
                Ok(report)
            }
            Attempt::Vanished => Err(EngineError::NotActivatable(session_id.clone())),
        }
    }

    /// Scheduler callback body: one fired job, isolated from every other.
    pub(crate) async fn run_fired_job(&self, session_id: SessionId) {
        debug!(session_id = %session_id, "Activation job fired");

        let outcome = self.activate_with_retry(&session_id).await;

        // The fire consumed this job whatever happened; a session that is
        // still scheduled remotely will be picked up again by the next
        // reconciliation.
        self.remove_job(&session_id).await;

        match outcome {
            Ok(Attempt::Activated(report)) => {
                info!(
                    session_id = %report.session_id,
                    channel = %report.channel,
                    ended_conflicts = report.ended_conflicts.len(),
                    "Session activated"
                );
                for warning in &report.warnings {
                    warn!(session_id = %report.session_id, "{}", warning);
                }
            }
            Ok(Attempt::Vanished) => {
                // Benign race, not a failure
                info!(session_id = %session_id, "Session vanished before firing; job dropped");
            }
            Err(GatewayError::NotFound(_)) => {
                info!(session_id = %session_id, "Session deleted before activation; job dropped");
            }
            Err(GatewayError::PermissionDenied(msg)) => {
                error!(
                    session_id = %session_id,
                    reason = %msg,
                    "Activation rejected: missing permission to manage sessions"
                );
            }
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    error = %err,
                    "Activation abandoned after retries"
                );
            }
        }
    }

    /// Run activation attempts under the bounded backoff schedule. Only
    /// transient gateway failures are retried.
    async fn activate_with_retry(&self, session_id: &SessionId) -> Result<Attempt, GatewayError> {
        let mut attempt = 1;
        loop {
            match self.attempt_activation(session_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() => {
                    let Some(mut delay) = self.retry.delay_after(attempt) else {
                        return Err(err);
                    };
                    if let GatewayError::RateLimited {
                        retry_after: Some(hint),
                    } = &err
                    {
                        delay = delay.max(*hint);
                    }
                    warn!(
                        session_id = %session_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient gateway failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One activation attempt: refresh the remote view, re-validate the
    /// target, end conflicting live sessions, activate.
    async fn attempt_activation(&self, session_id: &SessionId) -> Result<Attempt, GatewayError> {
        let listed = self.gateway.list_scheduled_sessions(&self.guild).await?;

        // Lock, refresh the cache, decide, release. No gateway calls here.
        let (target_channel, conflicts) = {
            let mut state = self.state.lock().await;
            state.sessions = listed
                .iter()
                .filter(|s| s.kind.is_voice_like())
                .map(|s| (s.id.clone(), s.clone()))
                .collect();

            let Some(target) = state.sessions.get(session_id) else {
                return Ok(Attempt::Vanished);
            };
            if !target.qualifies() {
                return Ok(Attempt::Vanished);
            }
            let Some(channel) = target.channel.clone() else {
                return Ok(Attempt::Vanished);
            };

            let conflicts: Vec<SessionId> = state
                .sessions
                .values()
                .filter(|s| s.id != *session_id && s.is_live() && s.channel.as_ref() == Some(&channel))
                .map(|s| s.id.clone())
                .collect();

            (channel, conflicts)
        };

        if conflicts.len() > 1 {
            // One live session per channel is the platform's own rule;
            // seeing several is an anomaly worth recording, then ending all.
            warn!(
                channel = %target_channel,
                count = conflicts.len(),
                "Multiple live sessions found in one channel; ending all"
            );
        }

        let mut ended_conflicts = Vec::new();
        let mut warnings = Vec::new();
        for conflict in conflicts {
            match self.gateway.end_session(&self.guild, &conflict).await {
                Ok(()) => {
                    info!(
                        session_id = %conflict,
                        channel = %target_channel,
                        "Ended conflicting live session"
                    );
                    ended_conflicts.push(conflict);
                }
                Err(GatewayError::NotFound(_)) => {
                    // Gone on its own; the channel is free either way
                    debug!(session_id = %conflict, "Conflicting session already gone");
                    ended_conflicts.push(conflict);
                }
                Err(err) => {
                    // Best-effort: a stuck prior session must never block
                    // the next scheduled one.
                    warnings.push(format!(
                        "failed to end conflicting session {}: {}",
                        conflict, err
                    ));
                }
            }
        }

        self.gateway.activate_session(&self.guild, session_id).await?;

        Ok(Attempt::Activated(ActivationReport {
            session_id: session_id.clone(),
            channel: target_channel,
            ended_conflicts,
            warnings,
        }))
    }
}
