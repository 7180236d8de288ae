//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a store field is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When a computation runs, we push an entry onto the stack. When it
//! completes, we pop it and hand back the fields it read.
//!
//! This design supports nested tracked runs: a computation started from
//! inside another one tracks its own reads, and the outer computation
//! resumes tracking once the inner one returns.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::computation::{ComputationId, ComputationInner};
use super::store::{Key, StoreId, StoreInner};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// A field read by a computation.
#[derive(Debug, Clone)]
pub(crate) struct Source {
    pub(crate) store_id: StoreId,
    pub(crate) store: Weak<StoreInner>,
    pub(crate) key: Key,
}

impl Source {
    pub(crate) fn same_field(&self, other: &Source) -> bool {
        self.store_id == other.store_id && self.key == other.key
    }
}

pub(crate) type Sources = SmallVec<[Source; 4]>;

/// An entry in the reactive context stack.
struct ContextEntry {
    computation_id: ComputationId,
    computation: Weak<ComputationInner>,
    /// Distinct fields read during this run, in first-read order.
    sources: Sources,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    computation_id: ComputationId,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    pub(crate) fn enter(computation: &Arc<ComputationInner>) -> Self {
        let computation_id = computation.id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                computation_id,
                computation: Arc::downgrade(computation),
                sources: Sources::new(),
            });
        });

        Self {
            computation_id,
            popped: false,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the currently running computation's ID, if any.
    pub fn current_computation() -> Option<ComputationId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.computation_id))
    }

    /// Nesting depth of tracked runs on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Whether the computation is anywhere on this thread's stack.
    pub fn is_running(id: ComputationId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.computation_id == id)
        })
    }

    pub(crate) fn current() -> Option<(ComputationId, Weak<ComputationInner>)> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| (entry.computation_id, entry.computation.clone()))
        })
    }

    /// Record a read on the innermost context. Repeated reads of the same
    /// field are recorded once.
    pub(crate) fn track(source: Source) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.sources.iter().any(|s| s.same_field(&source)) {
                    entry.sources.push(source);
                }
            }
        });
    }

    /// Leave the context, returning the fields read while it was active.
    pub(crate) fn finish(mut self) -> Sources {
        self.popped = true;
        self.pop().unwrap_or_default()
    }

    fn pop(&self) -> Option<Sources> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Contexts must unwind in LIFO order.
            popped.map(|entry| {
                debug_assert_eq!(
                    entry.computation_id, self.computation_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.computation_id, entry.computation_id
                );
                entry.sources
            })
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.popped {
            self.pop();
        }
    }
}
