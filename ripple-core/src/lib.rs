//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI kernel.
//! It implements:
//!
//! - A reactive store with automatic dependency tracking
//! - A virtual tree diff/patch engine over an abstract display adapter
//! - A small app host that wires the two together
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Stores, computations and dependency tracking
//! - `render`: Node snapshots, mount and diff, display adapters
//! - `app`: Re-renders a tree whenever the state it read changes
//! - `config`: Per-thread runtime tunables
//!
//! `reactive` and `render` are independent; only `app` uses both.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::app::App;
//! use ripple_core::reactive::Store;
//! use ripple_core::render::{h, memory::MemoryDom};
//! use serde_json::json;
//!
//! let state = Store::from_value(json!({ "message": "hello" })).unwrap();
//!
//! let dom = MemoryDom::new();
//! let root = dom.root();
//! let app = App::mount(dom, root, {
//!     let state = state.clone();
//!     move || {
//!         let message = state.get("message").unwrap_or_default();
//!         Ok(h("p", None, message.as_str().unwrap_or_default()))
//!     }
//! })?;
//!
//! // Re-renders the paragraph text in place.
//! state.set("message", "olleh")?;
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod reactive;
pub mod render;

pub use config::ReactiveConfig;
pub use error::{AppError, BoxError, ReactiveError, RenderError};
