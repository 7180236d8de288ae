//! Error Types
//!
//! Errors surfaced by the reactive store, the diff engine and the app host.
//!
//! # Propagation
//!
//! The reactive layer never swallows an error returned by a computation.
//! A write that triggers notification returns the first error raised by any
//! dependent computation (however deep the re-entrant chain), so a host
//! performing a state write may observe failures from re-render logic.

use thiserror::Error;

use crate::reactive::ComputationId;

/// Boxed error returned by computations and display adapters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while running or notifying computations.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A computation returned an error while running.
    #[error("computation {id:?} failed: {source}")]
    Computation {
        id: ComputationId,
        #[source]
        source: BoxError,
    },

    /// A write to a sequence landed too far past its end.
    #[error("index {index} is too far past the end of a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Re-entrant notification went deeper than the configured limit.
    #[error("notification depth {depth} exceeds configured maximum")]
    NotifyDepthExceeded { depth: usize },
}

/// Errors raised while mounting or diffing a node tree.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The node does not describe a valid element.
    #[error("malformed node: {reason}")]
    MalformedNode { reason: String },

    /// The display adapter failed an operation.
    #[error("display adapter failed during {op}: {source}")]
    Adapter {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// The old side of a diff was never mounted.
    #[error("node <{tag}> has no mounted element")]
    Unmounted { tag: String },
}

impl RenderError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedNode {
            reason: reason.into(),
        }
    }

    pub(crate) fn adapter<E>(op: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<BoxError>,
    {
        move |e| Self::Adapter {
            op,
            source: e.into(),
        }
    }
}

/// Errors surfaced by [`App`](crate::app::App).
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
