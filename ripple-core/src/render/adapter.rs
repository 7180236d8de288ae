//! Display Adapter
//!
//! The diff engine talks to the live display tree only through these eight
//! operations. Anything that can create, attach and mutate elements (a DOM
//! binding, a terminal widget tree, the in-memory tree used in tests) can
//! back the engine.

use super::node::Handler;
use crate::error::BoxError;

/// Operations the diff engine needs from a display tree.
pub trait DisplayAdapter {
    /// Opaque reference to a live element or text node.
    type Handle: Clone;

    /// Failure raised by any operation. Propagated, never swallowed.
    type Error: Into<BoxError>;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> Result<Self::Handle, Self::Error>;

    /// Create a detached text node.
    fn create_text_node(&mut self, text: &str) -> Result<Self::Handle, Self::Error>;

    fn set_attribute(&mut self, el: &Self::Handle, key: &str, value: &str) -> Result<(), Self::Error>;

    fn remove_attribute(&mut self, el: &Self::Handle, key: &str) -> Result<(), Self::Error>;

    /// Register `handler` for `event` on `el`.
    ///
    /// The engine calls this again with the new handler whenever an
    /// `on`-attribute changes; it never asks for a listener to be removed.
    fn add_event_listener(
        &mut self,
        el: &Self::Handle,
        event: &str,
        handler: &Handler,
    ) -> Result<(), Self::Error>;

    /// Attach `el` as a child of `parent`, before `anchor` if given,
    /// otherwise as the last child.
    fn insert(
        &mut self,
        el: &Self::Handle,
        parent: &Self::Handle,
        anchor: Option<&Self::Handle>,
    ) -> Result<(), Self::Error>;

    /// Detach `el` from `parent`.
    fn remove(&mut self, el: &Self::Handle, parent: &Self::Handle) -> Result<(), Self::Error>;

    /// Replace the whole text content of `el`.
    fn set_text(&mut self, el: &Self::Handle, text: &str) -> Result<(), Self::Error>;
}
