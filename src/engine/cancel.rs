//! Cooperative cancellation.
//!
//! Each task carries a [`CancelController`] with the state machine
//! `idle → cancelable → {idle, cancelled}`. A cancel request is always
//! recorded, but it is only *delivered* while the task is inside a declared
//! cancelable region: synchronously at the next
//! [`checkpoint`](CancelController::checkpoint), or asynchronously through
//! [`delivered`](CancelController::delivered), which the session layer races
//! against a pending receive so a blocked task observes the cancel promptly
//! rather than after a full I/O timeout.
//!
//! Controllers form the same hierarchy as tasks, and regions scope
//! dynamically: a request recorded anywhere on the self-or-ancestor chain is
//! delivered whenever a region is open anywhere on that chain. Cancelling
//! the root therefore interrupts whichever descendant is currently
//! executing, while cancelling a child never touches its parent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::core::error::ScriptError;

/// Per-task cancellation state.
pub struct CancelController {
    /// Depth of nested cancelable regions; > 0 means deliverable.
    region_depth: AtomicUsize,
    requested: AtomicBool,
    parent: Option<Arc<CancelController>>,
    /// One wake-up channel per hierarchy; any cancel() pings every waiter.
    wakeup: Arc<watch::Sender<u64>>,
}

impl CancelController {
    /// Create a root controller in the idle state.
    pub fn new() -> Self {
        let (wakeup, _) = watch::channel(0);
        Self {
            region_depth: AtomicUsize::new(0),
            requested: AtomicBool::new(false),
            parent: None,
            wakeup: Arc::new(wakeup),
        }
    }

    /// Create a controller for a child task.
    pub fn child(self: &Arc<Self>) -> Self {
        Self {
            region_depth: AtomicUsize::new(0),
            requested: AtomicBool::new(false),
            parent: Some(Arc::clone(self)),
            wakeup: Arc::clone(&self.wakeup),
        }
    }

    /// Request cancellation of this task.
    ///
    /// The request is always recorded. Returns `true` when the task is
    /// currently inside a cancelable region and will observe the request at
    /// its next suspension point; `false` when delivery is deferred until
    /// the task re-enters a region or finishes.
    pub fn cancel(&self) -> bool {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.wakeup.send_modify(|n| *n += 1);
        let deliverable = self.is_cancelable();
        debug!(deliverable, "cancel requested");
        deliverable
    }

    /// Whether a cancel request has been recorded on this task.
    pub fn is_cancel_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Whether this task is currently inside a cancelable region.
    pub fn is_cancelable(&self) -> bool {
        self.region_depth.load(Ordering::SeqCst) > 0
    }

    // A request on any enclosing task applies to this one.
    fn is_requested_in_scope(&self) -> bool {
        if self.is_cancel_requested() {
            return true;
        }
        self.parent
            .as_deref()
            .is_some_and(|p| p.is_requested_in_scope())
    }

    // Regions scope dynamically: a region opened by a parent covers the
    // children it is currently awaiting.
    fn is_in_region_scope(&self) -> bool {
        if self.is_cancelable() {
            return true;
        }
        self.parent
            .as_deref()
            .is_some_and(|p| p.is_in_region_scope())
    }

    /// Whether a cancel would be delivered at a checkpoint right now.
    fn is_deliverable(&self) -> bool {
        self.is_requested_in_scope() && self.is_in_region_scope()
    }

    /// Enter a cancelable region; the guard exits it on drop.
    pub fn enter(&self) -> CancelableRegion<'_> {
        self.region_depth.fetch_add(1, Ordering::SeqCst);
        CancelableRegion { controller: self }
    }

    /// Raise [`ScriptError::Cancelled`] if a cancel is deliverable here.
    pub fn checkpoint(&self) -> Result<(), ScriptError> {
        if self.is_deliverable() {
            Err(ScriptError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once a deliverable cancel request exists.
    ///
    /// Never resolves while the whole ancestor chain is outside cancelable
    /// regions. Intended for `select!`-style racing against a blocking
    /// receive.
    pub async fn delivered(&self) {
        let mut rx = self.wakeup.subscribe();
        loop {
            if self.is_deliverable() {
                return;
            }
            // The sender lives as long as self, so changed() cannot fail
            // while anyone still polls this future.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a cancelable region.
pub struct CancelableRegion<'a> {
    controller: &'a CancelController,
}

impl Drop for CancelableRegion<'_> {
    fn drop(&mut self) {
        self.controller.region_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owning variant of [`CancelableRegion`], for holding across `&mut` uses
/// of the surrounding context.
pub struct OwnedCancelableRegion {
    controller: Arc<CancelController>,
}

impl OwnedCancelableRegion {
    pub(crate) fn enter(controller: Arc<CancelController>) -> Self {
        controller.region_depth.fetch_add(1, Ordering::SeqCst);
        Self { controller }
    }
}

impl Drop for OwnedCancelableRegion {
    fn drop(&mut self) {
        self.controller.region_depth.fetch_sub(1, Ordering::SeqCst);
    }
}
