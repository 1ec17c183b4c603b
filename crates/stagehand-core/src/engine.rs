//! Automation engine: job table and reconciler

use chrono::{DateTime, Utc};
use stagehand_api::{JobView, ReconcileOutcome, StatusSnapshot, API_VERSION};
use stagehand_gateway::{GatewayError, Session, SessionGateway};
use stagehand_util::{duration_until, Backoff, ChannelId, GuildId, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Scheduler;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The session is unknown to the remote platform or no longer eligible
    #[error("Session {0} is not eligible for activation")]
    NotActivatable(SessionId),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Minimum delay applied to past-due fire instants
    pub min_lookahead: Duration,
    /// Retry schedule for activation attempts
    pub retry: Backoff,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_lookahead: stagehand_util::MIN_LOOKAHEAD,
            retry: Backoff::default(),
        }
    }
}

/// The engine's local intent to activate one session at one instant
#[derive(Debug, Clone)]
pub struct Job {
    pub session_id: SessionId,
    pub name: String,
    pub channel: ChannelId,
    /// Start instant announced by the remote platform
    pub starts_at: DateTime<Utc>,
    /// Instant the timer is armed for (post-clamping)
    pub fire_at: DateTime<Utc>,
}

/// Shared mutable state: job table plus cached remote view.
///
/// Every access goes through one `tokio::sync::Mutex`; gateway calls are
/// never made while the lock is held.
#[derive(Default)]
pub(crate) struct EngineState {
    pub(crate) jobs: HashMap<SessionId, Job>,
    pub(crate) sessions: HashMap<SessionId, Session>,
    pub(crate) last_reconcile_at: Option<DateTime<Utc>>,
}

/// The session automation engine.
///
/// Cheap to clone; clones share the job table, scheduler, and gateway
/// handle. Constructed once and passed explicitly to whatever needs it.
#[derive(Clone)]
pub struct Engine {
    pub(crate) guild: GuildId,
    pub(crate) gateway: Arc<dyn SessionGateway>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) state: Arc<Mutex<EngineState>>,
    pub(crate) retry: Backoff,
}

impl Engine {
    pub fn new(guild: GuildId, gateway: Arc<dyn SessionGateway>, config: EngineConfig) -> Self {
        info!(guild = %guild, "Engine initialized");

        Self {
            guild,
            gateway,
            scheduler: Arc::new(Scheduler::new(config.min_lookahead)),
            state: Arc::new(Mutex::new(EngineState::default())),
            retry: config.retry,
        }
    }

    pub fn guild(&self) -> &GuildId {
        &self.guild
    }

    /// Resynchronize the job table with the remote session list.
    ///
    /// On fetch failure the cycle aborts and prior state is preserved
    /// unchanged; the next periodic cycle retries.
    pub async fn reconcile(&self) -> EngineResult<ReconcileOutcome> {
        let listed = self.gateway.list_scheduled_sessions(&self.guild).await?;

        let mut outcome = ReconcileOutcome::default();
        let mut state = self.state.lock().await;

        // Refresh the cached view: every voice/stage session, any status,
        // so channel occupancy can be derived from it later.
        state.sessions = listed
            .iter()
            .filter(|s| s.kind.is_voice_like())
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        let qualifying: HashMap<SessionId, &Session> = listed
            .iter()
            .filter(|s| s.qualifies())
            .map(|s| (s.id.clone(), s))
            .collect();

        // Drop jobs whose session vanished, was canceled, or went active
        // through external means.
        let stale: Vec<SessionId> = state
            .jobs
            .keys()
            .filter(|id| !qualifying.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            state.jobs.remove(&id);
            self.scheduler.cancel(&id);
            outcome.removed += 1;
            info!(session_id = %id, "Job removed: session no longer qualifies");
        }

        for (id, session) in qualifying {
            let Some(channel) = session.channel.clone() else {
                continue;
            };

            let existing = state.jobs.get(&id).map(|j| (j.starts_at, j.channel.clone()));
            match existing {
                None => {
                    let fire_at = self.arm_timer(&id, session.starts_at);
                    state.jobs.insert(
                        id.clone(),
                        Job {
                            session_id: id.clone(),
                            name: session.name.clone(),
                            channel,
                            starts_at: session.starts_at,
                            fire_at,
                        },
                    );
                    outcome.added += 1;
                    info!(
                        session_id = %id,
                        name = %session.name,
                        starts_at = %session.starts_at,
                        fire_at = %fire_at,
                        "Job scheduled"
                    );
                }
                Some((starts_at, job_channel))
                    if starts_at != session.starts_at || job_channel != channel =>
                {
                    // Still tracked, but the session moved: re-arm in place.
                    let fire_at = self.arm_timer(&id, session.starts_at);
                    if let Some(job) = state.jobs.get_mut(&id) {
                        job.name = session.name.clone();
                        job.channel = channel;
                        job.starts_at = session.starts_at;
                        job.fire_at = fire_at;
                    }
                    outcome.updated += 1;
                    info!(
                        session_id = %id,
                        starts_at = %session.starts_at,
                        fire_at = %fire_at,
                        "Job rescheduled in place"
                    );
                }
                Some(_) => {}
            }
        }

        state.last_reconcile_at = Some(Utc::now());

        info!(
            added = outcome.added,
            removed = outcome.removed,
            updated = outcome.updated,
            tracked = state.jobs.len(),
            "Reconciliation complete"
        );

        Ok(outcome)
    }

    /// Arm (or re-arm) the activation timer for a session. Scheduling the
    /// same id replaces any previous timer, so the at-most-one-job
    /// invariant extends to the timer arena.
    fn arm_timer(&self, session_id: &SessionId, starts_at: DateTime<Utc>) -> DateTime<Utc> {
        let engine = self.clone();
        let id = session_id.clone();
        self.scheduler.schedule(session_id.clone(), starts_at, move || async move {
            engine.run_fired_job(id).await;
        })
    }

    /// Views of all tracked jobs, soonest first.
    pub async fn list_scheduled(&self) -> Vec<JobView> {
        let now = Utc::now();
        let state = self.state.lock().await;

        let mut views: Vec<JobView> = state
            .jobs
            .values()
            .map(|job| JobView {
                session_id: job.session_id.clone(),
                name: job.name.clone(),
                channel: job.channel.clone(),
                starts_at: job.starts_at,
                fire_at: job.fire_at,
                time_remaining: duration_until(job.fire_at, now),
            })
            .collect();
        views.sort_by_key(|v| v.fire_at);
        views
    }

    /// Snapshot for the status surface.
    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().await;

        StatusSnapshot {
            api_version: API_VERSION,
            guild: self.guild.clone(),
            tracked_jobs: state.jobs.len(),
            armed_timers: self.scheduler.pending(),
            scheduler_live: self.scheduler.is_live(),
            last_reconcile_at: state.last_reconcile_at,
            next_fire_at: state.jobs.values().map(|j| j.fire_at).min(),
        }
    }

    /// Remove a job and disarm its timer; used by workers after firing.
    pub(crate) async fn remove_job(&self, session_id: &SessionId) {
        let mut state = self.state.lock().await;
        if state.jobs.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Job removed from table");
        }
        self.scheduler.cancel(session_id);
    }

    /// Cancel all timers. In-flight activations run to completion.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        info!("Engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stagehand_gateway::{EntityKind, MockGateway, SessionStatus};

    fn make_session(id: &str, channel: &str, starts_at: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::new(id),
            guild: GuildId::new("g1"),
            name: format!("session {}", id),
            channel: Some(ChannelId::new(channel)),
            starts_at,
            status: SessionStatus::Scheduled,
            kind: EntityKind::Voice,
        }
    }

    fn future_instant() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::minutes(30)
    }

    fn make_engine(gateway: Arc<MockGateway>) -> Engine {
        Engine::new(GuildId::new("g1"), gateway, EngineConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_adds_one_job_per_qualifying_session() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));
        gateway.put_session(make_session("2", "c2", future_instant()));

        // Active and external sessions never enter the job table
        let mut active = make_session("3", "c3", future_instant());
        active.status = SessionStatus::Active;
        gateway.put_session(active);
        let mut external = make_session("4", "c4", future_instant());
        external.kind = EntityKind::Other;
        gateway.put_session(external);

        let engine = make_engine(gateway);
        let outcome = engine.reconcile().await.unwrap();

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.removed, 0);
        assert_eq!(engine.status().await.tracked_jobs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_is_idempotent_on_unchanged_data() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));

        let engine = make_engine(gateway);
        let first = engine.reconcile().await.unwrap();
        assert_eq!(first.added, 1);

        let second = engine.reconcile().await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(second.updated, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_preserves_job_table() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));

        let engine = make_engine(gateway.clone());
        engine.reconcile().await.unwrap();

        gateway.fail_next_list(GatewayError::Unavailable("connection refused".into()));
        let err = engine.reconcile().await.unwrap_err();
        assert!(matches!(err, EngineError::Gateway(GatewayError::Unavailable(_))));

        // Prior state retained unchanged
        assert_eq!(engine.status().await.tracked_jobs, 1);
        assert_eq!(engine.scheduler.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_session_job_is_removed_and_timer_canceled() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));

        let engine = make_engine(gateway.clone());
        engine.reconcile().await.unwrap();
        assert_eq!(engine.scheduler.pending(), 1);

        gateway.remove_session(&SessionId::new("1"));
        let outcome = engine.reconcile().await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(engine.status().await.tracked_jobs, 0);
        assert_eq!(engine.scheduler.pending(), 0);

        // Past the original fire instant: nothing may fire
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(gateway.activate_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn externally_started_session_job_is_removed() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));

        let engine = make_engine(gateway.clone());
        engine.reconcile().await.unwrap();

        gateway.set_status(&SessionId::new("1"), SessionStatus::Active);
        let outcome = engine.reconcile().await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.added, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_time_change_updates_job_in_place() {
        let gateway = Arc::new(MockGateway::new());
        let starts = future_instant();
        gateway.put_session(make_session("1", "c1", starts));

        let engine = make_engine(gateway.clone());
        engine.reconcile().await.unwrap();
        let before = engine.list_scheduled().await;
        assert_eq!(before.len(), 1);

        let moved = starts + chrono::Duration::hours(2);
        gateway.put_session(make_session("1", "c1", moved));

        let outcome = engine.reconcile().await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.updated, 1);

        let after = engine.list_scheduled().await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].starts_at, moved);
        assert_eq!(engine.scheduler.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_session_fires_after_lookahead_not_immediately() {
        let gateway = Arc::new(MockGateway::new());
        let past = Utc::now() - chrono::Duration::minutes(10);
        gateway.put_session(make_session("1", "c1", past));

        let engine = make_engine(gateway.clone());
        engine.reconcile().await.unwrap();

        let jobs = engine.list_scheduled().await;
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].fire_at > Utc::now());

        // Not fired yet shortly after reconcile
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(gateway.activate_calls().is_empty());

        // Fired once the lookahead elapses
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(gateway.activate_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_next_fire() {
        let gateway = Arc::new(MockGateway::new());
        let soon = Utc::now() + chrono::Duration::minutes(5);
        let later = Utc::now() + chrono::Duration::minutes(50);
        gateway.put_session(make_session("1", "c1", later));
        gateway.put_session(make_session("2", "c2", soon));

        let engine = make_engine(gateway);
        engine.reconcile().await.unwrap();

        let status = engine.status().await;
        assert_eq!(status.tracked_jobs, 2);
        assert_eq!(status.armed_timers, 2);
        assert!(status.scheduler_live);
        assert_eq!(status.next_fire_at, Some(soon));
        assert!(status.last_reconcile_at.is_some());

        let listed = engine.list_scheduled().await;
        assert_eq!(listed[0].session_id, SessionId::new("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn timestamps_far_apart_do_not_collide() {
        // Regression guard for the diff key: two sessions sharing a channel
        // but with distinct ids must both be tracked.
        let gateway = Arc::new(MockGateway::new());
        gateway.put_session(make_session("1", "c1", future_instant()));
        gateway.put_session(make_session(
            "2",
            "c1",
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        ));

        let engine = make_engine(gateway);
        let outcome = engine.reconcile().await.unwrap();
        assert_eq!(outcome.added, 2);
    }
}
