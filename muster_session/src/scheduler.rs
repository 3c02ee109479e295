//! Background extension of an active session
//!
//! Three recurring tasks keep a long-lived session alive without user
//! interaction: a liveness ping, a routine refresh placed safely inside the
//! credential lifetime, and a more frequent defensive refresh whose failures
//! are deliberately soft.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::{controller::SessionHandle, error::LogoutReason};

/// The intervals for the three background tasks
///
/// Each task is independently configurable; tests drive them with short
/// periods under tokio's paused clock.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// How often to probe `GET /auth/keep-alive`
    pub keep_alive_every: Duration,
    /// How often to perform the authoritative credential refresh
    pub routine_refresh_every: Duration,
    /// How often to perform the defensive, soft-failure refresh
    pub frequent_refresh_every: Duration,
}

impl Default for SchedulerConfig {
    /// Default intervals
    ///
    /// The liveness ping fires every 30 minutes. The routine refresh fires
    /// every 20 hours, safely inside the platform's 24-hour credential
    /// lifetime. The frequent refresh fires every 2 hours as a defensive
    /// extension for active sessions.
    fn default() -> Self {
        Self {
            keep_alive_every: Duration::from_secs(30 * 60),
            routine_refresh_every: Duration::from_secs(20 * 60 * 60),
            frequent_refresh_every: Duration::from_secs(2 * 60 * 60),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TaskAction {
    KeepAlive,
    Refresh,
}

/// What a task does when its action fails
#[derive(Clone, Copy, Debug)]
enum FailurePolicy {
    /// A hard credential rejection ends the session; anything else is logged
    EscalateHard,
    /// Failures are logged and retried at the next tick
    LogOnly,
}

struct IntervalTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// The owner of the three background interval tasks
///
/// Tasks are created once when the session controller is built and cancelled
/// exactly once on teardown; identity changes never recreate them. Every tick
/// begins with a credential check and is a no-op when none is held.
pub struct RefreshScheduler {
    tasks: Vec<IntervalTask>,
}

impl RefreshScheduler {
    pub(crate) fn idle() -> Self {
        Self { tasks: Vec::new() }
    }

    pub(crate) fn spawn(session: SessionHandle, config: &SchedulerConfig) -> Self {
        let table = [
            (
                "keep-alive",
                config.keep_alive_every,
                TaskAction::KeepAlive,
                FailurePolicy::EscalateHard,
            ),
            (
                "routine-refresh",
                config.routine_refresh_every,
                TaskAction::Refresh,
                FailurePolicy::EscalateHard,
            ),
            (
                "frequent-refresh",
                config.frequent_refresh_every,
                TaskAction::Refresh,
                FailurePolicy::LogOnly,
            ),
        ];

        let tasks = table
            .into_iter()
            .map(|(name, every, action, policy)| IntervalTask {
                name,
                handle: tokio::spawn(run_interval(session.clone(), name, every, action, policy)),
            })
            .collect();

        Self { tasks }
    }

    /// Whether any interval task is still running
    pub fn is_active(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Cancels all interval tasks
    ///
    /// Tasks are drained on the first call; calling again is a no-op.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.handle.abort();
            tracing::debug!(task = task.name, "cancelled interval task");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field(
                "tasks",
                &self.tasks.iter().map(|t| t.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

async fn run_interval(
    session: SessionHandle,
    name: &'static str,
    every: Duration,
    action: TaskAction,
    policy: FailurePolicy,
) {
    // The first fire is one full period after spawn, not immediately.
    let mut ticker = time::interval_at(time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if session.token().is_none() {
            tracing::trace!(task = name, "no credential held, skipping tick");
            continue;
        }

        let outcome = match action {
            TaskAction::KeepAlive => session.keep_alive().await,
            TaskAction::Refresh => session.try_refresh().await.map(|_| ()),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(task = name, "interval task completed");
            }
            Err(error) if matches!(policy, FailurePolicy::EscalateHard) && error.is_hard() => {
                let reason = error.logout_reason().unwrap_or(LogoutReason::TokenInvalid);
                tracing::warn!(
                    task = name,
                    error = &error as &dyn std::error::Error,
                    "credential rejected, ending session"
                );
                session.force_logout(reason).await;
            }
            Err(error) => {
                tracing::warn!(
                    task = name,
                    error = &error as &dyn std::error::Error,
                    "interval task failed, will retry at next tick"
                );
            }
        }
    }
}
