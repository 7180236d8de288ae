//! Computation Implementation
//!
//! A Computation is a re-runnable unit of work that reads store fields and
//! produces side effects. It re-runs whenever a field it read is written.
//!
//! # How Computations Work
//!
//! 1. [`run_tracked`] runs the computation once, inside a tracking context,
//!    to establish its initial dependencies.
//!
//! 2. When any of those fields is written, the store re-runs it
//!    synchronously.
//!
//! 3. Each run records a fresh set of sources. Fields read last time but
//!    not this time are unsubscribed, so a computation stops hearing about
//!    fields it no longer cares about.
//!
//! # Lifetime
//!
//! Stores only hold weak references to computations. The [`Computation`]
//! handle returned by [`run_tracked`] keeps the computation subscribed;
//! once every handle is dropped the computation is unsubscribed everywhere
//! and never runs again.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{ReactiveContext, Sources};
use crate::config::ReactiveConfig;
use crate::error::{BoxError, ReactiveError};

/// Unique identifier for a computation.
///
/// Used to deduplicate registrations in dependency sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputationId(u64);

impl ComputationId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type RunFn = dyn Fn() -> Result<(), BoxError> + Send + Sync;

/// Fields a computation is subscribed to, tagged with the run that
/// recorded them.
struct Subscriptions {
    generation: u64,
    sources: Sources,
}

pub(crate) struct ComputationInner {
    id: ComputationId,
    run: Box<RunFn>,
    /// Incremented at the start of every run.
    generation: AtomicU64,
    subscriptions: Mutex<Subscriptions>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl ComputationInner {
    pub(crate) fn new<F>(run: F) -> Arc<Self>
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: ComputationId::new(),
            run: Box::new(run),
            generation: AtomicU64::new(0),
            subscriptions: Mutex::new(Subscriptions {
                generation: 0,
                sources: Sources::new(),
            }),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        })
    }

    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run the computation inside a tracking context and reconcile its
    /// subscriptions against the fields it read.
    pub(crate) fn execute(self: &Arc<Self>) -> Result<(), ReactiveError> {
        if self.is_disposed() {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(computation = ?self.id, generation, "running computation");

        let ctx = ReactiveContext::enter(self);
        let result = (self.run)();
        let sources = ctx.finish();

        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.reconcile(generation, sources);

        result.map_err(|source| ReactiveError::Computation {
            id: self.id,
            source,
        })
    }

    fn reconcile(&self, generation: u64, sources: Sources) {
        let prune = ReactiveConfig::current().prune_stale_dependencies;
        let mut subscriptions = self.subscriptions.lock();

        // An older run finishing after a newer one must not overwrite the
        // newer run's view; keep everything it subscribed so it stays
        // reachable for pruning and disposal.
        if !prune || generation < subscriptions.generation {
            for source in sources {
                if !subscriptions.sources.iter().any(|s| s.same_field(&source)) {
                    subscriptions.sources.push(source);
                }
            }
            return;
        }

        for stale in subscriptions
            .sources
            .iter()
            .filter(|old| !sources.iter().any(|new| new.same_field(old)))
        {
            if let Some(store) = stale.store.upgrade() {
                store.unsubscribe(&stale.key, self.id);
            }
        }

        subscriptions.generation = generation;
        subscriptions.sources = sources;
    }

    fn unsubscribe_all(&self) {
        let sources = std::mem::take(&mut self.subscriptions.lock().sources);
        for source in sources {
            if let Some(store) = source.store.upgrade() {
                store.unsubscribe(&source.key, self.id);
            }
        }
    }
}

impl Drop for ComputationInner {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

/// A handle to a tracked computation.
///
/// # Example
///
/// ```rust,ignore
/// let state = Store::from_value(json!({ "count": 0 })).unwrap();
///
/// let computation = run_tracked({
///     let state = state.clone();
///     move || {
///         println!("Count is: {:?}", state.get("count"));
///         Ok(())
///     }
/// })?;
///
/// state.set("count", 5)?;  // Prints: "Count is: Some(Number(5))"
/// ```
#[derive(Clone)]
#[must_use = "dropping every handle unsubscribes the computation"]
pub struct Computation {
    inner: Arc<ComputationInner>,
}

impl Computation {
    /// Create a computation without running it.
    ///
    /// It has no dependencies until [`Computation::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            inner: ComputationInner::new(run),
        }
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Run the computation now, re-recording its dependencies.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.inner.execute()
    }

    /// Stop the computation and drop all of its subscriptions.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.unsubscribe_all();
        tracing::debug!(computation = ?self.inner.id, "disposed computation");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of times the computation has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of distinct fields the computation is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.subscriptions.lock().sources.len()
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run `run` once as a tracked computation and keep it subscribed to every
/// field it read.
///
/// Calls may nest: a `run_tracked` made while another computation is
/// running tracks its own reads, and the outer computation resumes tracking
/// afterwards.
pub fn run_tracked<F>(run: F) -> Result<Computation, ReactiveError>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    let computation = Computation::new_lazy(run);
    computation.execute()?;
    Ok(computation)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Store;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computation_ids_are_unique() {
        let id1 = ComputationId::new();
        let id2 = ComputationId::new();
        let id3 = ComputationId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let computation = run_tracked(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let computation = Computation::new_lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(computation.run_count(), 0);

        computation.execute().unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn does_not_run_after_disposal() {
        let store = Store::from_value(json!({ "a": 1 })).unwrap();
        let runs = Arc::new(AtomicI32::new(0));

        let computation = run_tracked({
            let store = store.clone();
            let runs = runs.clone();
            move || {
                store.get("a");
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

        computation.dispose();
        assert!(computation.is_disposed());
        assert_eq!(store.dependent_count("a"), 0);

        store.set("a", 2).unwrap();
        computation.execute().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_unsubscribes() {
        let store = Store::from_value(json!({ "a": 1 })).unwrap();

        let computation = run_tracked({
            let store = store.clone();
            move || {
                store.get("a");
                Ok(())
            }
        })
        .unwrap();
        let other = computation.clone();
        assert_eq!(store.dependent_count("a"), 1);

        drop(computation);
        assert_eq!(store.dependent_count("a"), 1);

        drop(other);
        assert_eq!(store.dependent_count("a"), 0);
    }

    #[test]
    fn clone_shares_state() {
        let c1 = run_tracked(|| Ok(())).unwrap();
        let c2 = c1.clone();

        assert_eq!(c1.id(), c2.id());
        c1.execute().unwrap();
        assert_eq!(c2.run_count(), 2);

        c1.dispose();
        assert!(c2.is_disposed());
    }

    #[test]
    fn error_is_reported_with_id() {
        let computation = Computation::new_lazy(|| Err("boom".into()));
        let err = computation.execute().unwrap_err();

        match err {
            ReactiveError::Computation { id, source } => {
                assert_eq!(id, computation.id());
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The failed run still counts.
        assert_eq!(computation.run_count(), 1);
    }
}
