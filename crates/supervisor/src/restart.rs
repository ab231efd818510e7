//! Restart-with-backoff policy for supervised units.
//!
//! A unit is an async task that runs until shutdown. When it fails, the
//! supervisor restarts it after a delay from a fixed backoff schedule. A
//! stretch of stable uptime resets the schedule; exhausting it means the
//! unit is broken beyond retrying, so the whole process is brought down
//! rather than left limping with a dead pipeline stage.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use sentinel_core::{ShutdownToken, SupervisorConfig};

/// Lifecycle of one supervised unit, published on a watch channel so the
/// health reporter can snapshot it without touching the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Starting,
    Running,
    /// Failed and waiting out a backoff delay before the next attempt.
    Backoff,
    Stopped,
}

impl UnitState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Starting => "starting",
            UnitState::Running => "running",
            UnitState::Backoff => "backoff",
            UnitState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Delays applied to consecutive failures, in order.
    pub backoff: Vec<Duration>,
    /// Uptime after which the failure count resets to zero.
    pub stable_uptime: Duration,
}

impl RestartPolicy {
    #[must_use]
    pub fn from_app(config: &SupervisorConfig) -> Self {
        Self {
            backoff: config
                .restart_backoff_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            stable_uptime: Duration::from_secs(config.stable_uptime_secs),
        }
    }
}

/// Runs `unit` under the restart policy until shutdown.
///
/// Each invocation of the factory produces one attempt. A return while the
/// process is still live counts as a failure, clean or not: units are
/// expected to run until told to stop. After the backoff schedule is
/// exhausted without an intervening stable run, the supervisor escalates by
/// triggering global shutdown.
///
/// # Errors
/// Returns an error when the unit exhausted its restart schedule.
pub async fn supervise<F, Fut>(
    name: &str,
    policy: &RestartPolicy,
    shutdown: ShutdownToken,
    state: watch::Sender<UnitState>,
    mut unit: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut failures: usize = 0;

    loop {
        state.send_replace(UnitState::Starting);
        let started = Instant::now();
        let attempt = unit();
        state.send_replace(UnitState::Running);
        let result = attempt.await;

        if shutdown.is_set() {
            if let Err(e) = result {
                warn!(unit = name, error = %e, "Unit failed during shutdown");
            }
            info!(unit = name, "Unit finished");
            state.send_replace(UnitState::Stopped);
            return Ok(());
        }

        if started.elapsed() >= policy.stable_uptime {
            failures = 0;
        }

        match result {
            Ok(()) => warn!(unit = name, "Unit exited early, restarting"),
            Err(e) => warn!(unit = name, error = %e, "Unit failed, restarting"),
        }

        let Some(delay) = policy.backoff.get(failures).copied() else {
            error!(
                unit = name,
                failures,
                "Restart schedule exhausted, escalating to shutdown"
            );
            state.send_replace(UnitState::Stopped);
            shutdown.trigger();
            anyhow::bail!("unit {name} exhausted its restart schedule");
        };
        failures += 1;

        info!(
            unit = name,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            "Restarting unit after backoff"
        );
        state.send_replace(UnitState::Backoff);
        tokio::select! {
            () = shutdown.cancelled() => {
                info!(unit = name, "Shutdown during backoff");
                state.send_replace(UnitState::Stopped);
                return Ok(());
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(steps: usize) -> RestartPolicy {
        RestartPolicy {
            backoff: vec![Duration::from_millis(5); steps],
            stable_uptime: Duration::from_secs(60),
        }
    }

    fn state_channel() -> (watch::Sender<UnitState>, watch::Receiver<UnitState>) {
        watch::channel(UnitState::Starting)
    }

    #[tokio::test]
    async fn test_escalates_after_schedule_exhausted() {
        let shutdown = ShutdownToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let (state_tx, state_rx) = state_channel();

        let result = supervise("bad", &fast_policy(3), shutdown.clone(), state_tx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("boom")
            }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus one per backoff slot
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(shutdown.is_set(), "exhaustion must escalate to shutdown");
        assert_eq!(*state_rx.borrow(), UnitState::Stopped);
    }

    #[tokio::test]
    async fn test_restarts_then_runs_until_shutdown() {
        let shutdown = ShutdownToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let token = shutdown.clone();
        let unit_token = shutdown.clone();
        let (state_tx, state_rx) = state_channel();

        let handle = tokio::spawn(async move {
            let policy = fast_policy(3);
            supervise("flaky", &policy, token, state_tx, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let unit_token = unit_token.clone();
                async move {
                    if n < 2 {
                        anyhow::bail!("transient")
                    }
                    unit_token.cancelled().await;
                    Ok(())
                }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*state_rx.borrow(), UnitState::Running);

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(*state_rx.borrow(), UnitState::Stopped);
    }

    #[tokio::test]
    async fn test_clean_exit_without_shutdown_is_a_failure() {
        let shutdown = ShutdownToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let (state_tx, _state_rx) = state_channel();

        let result = supervise("quiet", &fast_policy(1), shutdown.clone(), state_tx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stable_uptime_resets_failure_count() {
        let shutdown = ShutdownToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let policy = RestartPolicy {
            backoff: vec![Duration::from_millis(5); 2],
            stable_uptime: Duration::from_millis(20),
        };
        let token = shutdown.clone();
        let (state_tx, _state_rx) = state_channel();

        let handle = tokio::spawn(async move {
            supervise("steady", &policy, token, state_tx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    // Outlives stable_uptime, so each failure starts the
                    // schedule from the top instead of escalating
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    anyhow::bail!("late crash")
                }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert!(
            attempts.load(Ordering::SeqCst) > 3,
            "schedule must keep resetting for a stable-then-failing unit"
        );
    }
}
