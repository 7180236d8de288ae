//! Notification Runtime
//!
//! Propagates a store write to the computations that depend on it.
//!
//! # How It Works
//!
//! 1. A store write collects the live members of the field's dependency
//!    set, in registration order.
//!
//! 2. Each dependent is re-run synchronously, to completion, before the
//!    next one starts and before the write returns.
//!
//! 3. Writes made by a dependent notify recursively on the same call stack.
//!
//! # Cycles
//!
//! A computation that writes a field it also reads would re-enter itself
//! forever. A dependent that is already running on this thread is skipped,
//! and the total nesting of notifications is bounded by
//! [`ReactiveConfig::max_notify_depth`].

use std::cell::Cell;
use std::sync::Arc;

use super::computation::ComputationInner;
use super::context::ReactiveContext;
use crate::config::ReactiveConfig;
use crate::error::ReactiveError;

thread_local! {
    static NOTIFY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Restores the notification depth on scope exit, including unwinding.
struct DepthGuard;

impl DepthGuard {
    fn enter(max: usize) -> Result<Self, ReactiveError> {
        let depth = NOTIFY_DEPTH.with(|d| d.get()) + 1;
        if depth > max {
            tracing::warn!(depth, max, "notification depth exceeded");
            return Err(ReactiveError::NotifyDepthExceeded { depth });
        }
        NOTIFY_DEPTH.with(|d| d.set(depth));
        Ok(Self)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NOTIFY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Current nesting of notifications on this thread.
pub fn notify_depth() -> usize {
    NOTIFY_DEPTH.with(|d| d.get())
}

/// Re-run each dependent in order. Stops at the first error.
pub(crate) fn notify(dependents: &[Arc<ComputationInner>]) -> Result<(), ReactiveError> {
    if dependents.is_empty() {
        return Ok(());
    }

    let _depth = DepthGuard::enter(ReactiveConfig::current().max_notify_depth)?;

    for computation in dependents {
        if computation.is_disposed() {
            continue;
        }

        if ReactiveContext::is_running(computation.id()) {
            tracing::warn!(
                computation = ?computation.id(),
                "skipping re-entrant run of a computation triggered by its own write"
            );
            continue;
        }

        computation.execute()?;
    }

    Ok(())
}
