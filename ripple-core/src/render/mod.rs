//! Virtual Tree Rendering
//!
//! This module turns immutable node snapshots into mutations of a live
//! display tree.
//!
//! # Overview
//!
//! - [`Node`] describes one element: tag, attributes and children.
//! - [`Renderer::mount`] materializes a snapshot.
//! - [`Renderer::diff`] reconciles a mounted snapshot against the next one,
//!   carrying element handles forward by position.
//! - [`DisplayAdapter`] is the seam to the actual display technology;
//!   [`memory::MemoryDom`] is a headless implementation.
//!
//! # Limitations
//!
//! Children are matched by index. There is no keyed reconciliation and no
//! move detection, and listeners are never removed (the adapter has no
//! operation for it).

mod adapter;
pub mod memory;
mod node;
mod patch;

pub use adapter::DisplayAdapter;
pub use node::{event_name, h, Children, Event, Handler, Node, PropValue, Props};
pub use patch::Renderer;
