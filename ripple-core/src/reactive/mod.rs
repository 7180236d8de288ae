//! Reactive Store
//!
//! This module implements fine-grained dependency tracking over plain keyed
//! records.
//!
//! # Concepts
//!
//! ## Stores
//!
//! A Store wraps a record. When a field is read within a running
//! computation, the store registers that computation as a dependent of the
//! field. When the field is written, every dependent re-runs.
//!
//! ## Computations
//!
//! A Computation is a side-effecting unit of work with no return value.
//! It runs once under [`run_tracked`] and re-runs whenever a field it read
//! changes. Each run re-records its dependencies, dropping fields it no
//! longer reads.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local stack of running computations to
//! detect dependencies. When a field is read, we check whether a computation
//! is running and, if so, register it.

mod computation;
mod context;
mod runtime;
mod scalar;
mod store;

pub use computation::{run_tracked, Computation, ComputationId};
pub use context::ReactiveContext;
pub use runtime::notify_depth;
pub use scalar::{box_scalar, Ref, ScalarRef};
pub use store::{Key, Record, Store, StoreId, MAX_SEQUENCE_PADDING};
