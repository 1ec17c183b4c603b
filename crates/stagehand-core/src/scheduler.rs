//! Timer scheduler
//!
//! One armed timer per session identifier, each running on its own tokio
//! task. The arena maps session id -> cancel handle; dropping the handle
//! cancels the timer, so replacing an entry re-arms it and clearing the
//! arena shuts everything down. A timer that has already dispatched its
//! callback ignores cancellation: cancel only prevents future firing.

use chrono::{DateTime, Utc};
use stagehand_util::{clamp_fire_instant, duration_until, SessionId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

struct TimerSlot {
    seq: u64,
    // Held only for its Drop side effect: dropping the sender resolves the
    // receiver and the timer task exits before firing.
    _cancel: oneshot::Sender<()>,
}

/// Priority-ordered timer subsystem keyed by session identifier.
pub struct Scheduler {
    timers: Arc<Mutex<HashMap<SessionId, TimerSlot>>>,
    next_seq: AtomicU64,
    lookahead: Duration,
    live: AtomicBool,
}

impl Scheduler {
    /// `lookahead` is the minimum delay applied to past-due fire instants.
    pub fn new(lookahead: Duration) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(1),
            lookahead,
            live: AtomicBool::new(true),
        }
    }

    /// Arm a timer for `session_id` at `fire_at`, replacing any existing
    /// timer for the same id. The callback runs at-most-once, no earlier
    /// than the returned (clamped) instant, on its own task.
    pub fn schedule<F, Fut>(
        &self,
        session_id: SessionId,
        fire_at: DateTime<Utc>,
        callback: F,
    ) -> DateTime<Utc>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Utc::now();
        let effective = clamp_fire_instant(fire_at, now, self.lookahead);
        let delay = duration_until(effective, now);

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        {
            let mut timers = self.timers.lock().unwrap();
            let replaced = timers
                .insert(
                    session_id.clone(),
                    TimerSlot {
                        seq,
                        _cancel: cancel_tx,
                    },
                )
                .is_some();
            if replaced {
                debug!(session_id = %session_id, "Replaced armed timer");
            }
        }

        let timers = self.timers.clone();
        let id = session_id;
        tokio::spawn(async move {
            tokio::select! {
                _ = &mut cancel_rx => {
                    trace!(session_id = %id, "Timer canceled before firing");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // Dispatched: clear our own arena slot, but only if it is still
            // ours. A reconciliation racing with the fire may have re-armed
            // the id with a newer timer that must stay untouched.
            {
                let mut timers = timers.lock().unwrap();
                if timers.get(&id).is_some_and(|slot| slot.seq == seq) {
                    timers.remove(&id);
                }
            }

            trace!(session_id = %id, "Timer fired");
            callback().await;
        });

        effective
    }

    /// Disarm the timer for `session_id`. A no-op for unknown ids and for
    /// timers that already fired or were already canceled.
    pub fn cancel(&self, session_id: &SessionId) {
        if self.timers.lock().unwrap().remove(session_id).is_some() {
            debug!(session_id = %session_id, "Timer canceled");
        }
    }

    /// Number of armed (not yet fired) timers.
    pub fn pending(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Disarm every timer and mark the scheduler as stopped. In-flight
    /// callbacks run to completion.
    pub fn shutdown(&self) {
        let drained = {
            let mut timers = self.timers.lock().unwrap();
            let n = timers.len();
            timers.clear();
            n
        };
        self.live.store(false, Ordering::SeqCst);
        debug!(canceled = drained, "Scheduler shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn in_secs(secs: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(secs)
    }

    #[tokio::test(start_paused = true)]
    async fn callback_fires_once_at_instant() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.schedule(SessionId::new("1"), in_secs(300), move || async move {
            let _ = tx.send(());
        });
        assert_eq!(scheduler.pending(), 1);

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());

        // Arena slot is cleared once fired
        tokio::task::yield_now().await;
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_timer_never_fires() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = SessionId::new("1");
        scheduler.schedule(id.clone(), in_secs(30), move || async move {
            let _ = tx.send(());
        });
        scheduler.cancel(&id);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_unknown_or_fired_is_noop() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        scheduler.cancel(&SessionId::new("ghost"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = SessionId::new("1");
        scheduler.schedule(id.clone(), in_secs(5), move || async move {
            let _ = tx.send(());
        });
        rx.recv().await.unwrap();

        // Already fired: canceling again must not panic or affect anything
        scheduler.cancel(&id);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous_timer() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = SessionId::new("1");
        let tx_old = tx.clone();
        scheduler.schedule(id.clone(), in_secs(600), move || async move {
            let _ = tx_old.send("old");
        });
        scheduler.schedule(id.clone(), in_secs(10), move || async move {
            let _ = tx.send("new");
        });
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(rx.recv().await, Some("new"));

        // Let the old timer's nominal instant elapse; it must stay silent
        tokio::time::sleep(Duration::from_secs(1200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_instant_clamped_to_lookahead() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let before = tokio::time::Instant::now();
        let effective =
            scheduler.schedule(SessionId::new("1"), in_secs(-600), move || async move {
                let _ = tx.send(());
            });

        assert!(effective > Utc::now());

        rx.recv().await.unwrap();
        let waited = tokio::time::Instant::now() - before;
        assert!(waited >= Duration::from_secs(59), "fired after {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disarms_everything() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..3 {
            let tx = tx.clone();
            scheduler.schedule(SessionId::new(format!("{}", i)), in_secs(30), move || async move {
                let _ = tx.send(());
            });
        }
        assert_eq!(scheduler.pending(), 3);

        scheduler.shutdown();
        assert!(!scheduler.is_live());
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }
}
