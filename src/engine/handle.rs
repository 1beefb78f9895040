//! Supervisor-facing handle for a running script hierarchy.
//!
//! The host scheduler spawns a root task, polls [`is_stale`]
//! (ScriptHandle::is_stale), cancels on timeout and finally joins to
//! collect the [`ScriptReport`]. Timeouts are advisory: the engine keeps no
//! internal timer, the supervisor owns the clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cache::Args;
use crate::core::types::{FailureKind, RunId, ScriptName};
use crate::engine::cancel::CancelController;
use crate::engine::runner::{run_to_report, ScriptReport};
use crate::engine::script::{ScriptContext, ScriptEnvironment, DEFAULT_TIMEOUT};

/// Handle to one spawned root task.
pub struct ScriptHandle {
    run_id: RunId,
    name: ScriptName,
    cancel: Arc<CancelController>,
    started: Instant,
    timeout: Duration,
    timed_out: AtomicBool,
    join: JoinHandle<ScriptReport>,
}

impl ScriptHandle {
    /// Spawn a root task on its own worker.
    pub fn spawn(env: Arc<ScriptEnvironment>, name: impl Into<ScriptName>, args: Args) -> Self {
        let name = name.into();
        let timeout = env
            .registry
            .resolve(&name)
            .map(|script| script.timeout())
            .unwrap_or(DEFAULT_TIMEOUT);

        let ctx = ScriptContext::new_root(name.clone(), env);
        let run_id = ctx.run_id();
        let cancel = Arc::clone(ctx.cancel_controller());
        let join = tokio::spawn(run_to_report(ctx, args));

        Self {
            run_id,
            name,
            cancel,
            started: Instant::now(),
            timeout,
            timed_out: AtomicBool::new(false),
            join,
        }
    }

    /// Run id of the hierarchy.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Root script name.
    pub fn name(&self) -> &ScriptName {
        &self.name
    }

    /// Whether elapsed time exceeds the script's advisory timeout.
    pub fn is_stale(&self) -> bool {
        self.started.elapsed() > self.timeout
    }

    /// Whether the root task has finished.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request cancellation of the root task.
    ///
    /// Returns `true` when the cancel is immediately deliverable (the task
    /// is inside a cancelable region).
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Cancel the run because the supervisor observed staleness.
    ///
    /// Returns `false` if the run is not actually stale yet. A run
    /// cancelled through here reports [`FailureKind::TimedOut`] instead of
    /// `Cancelled`.
    pub fn cancel_stale(&self) -> bool {
        if !self.is_stale() {
            return false;
        }
        self.timed_out.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        true
    }

    /// Wait for the run and collect its report.
    pub async fn join(self) -> ScriptReport {
        let mut report = match self.join.await {
            Ok(report) => report,
            Err(e) => {
                warn!(task = %self.name, error = %e, "root task panicked or was aborted");
                ScriptReport {
                    run_id: self.run_id,
                    name: self.name.clone(),
                    result: None,
                    failure: Some(FailureKind::Internal),
                    duration: self.started.elapsed(),
                }
            }
        };

        // Staleness is surfaced as its own flag, distinct from an ordinary
        // cancellation the body could have observed.
        if self.timed_out.load(Ordering::SeqCst)
            && matches!(report.failure, None | Some(FailureKind::Cancelled))
        {
            report.failure = Some(FailureKind::TimedOut);
            report.result = None;
        }
        report
    }
}
