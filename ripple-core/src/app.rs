//! App Host
//!
//! Wires a render function to the reactive store and the renderer. The
//! render function reads reactive state and returns a fresh snapshot; the
//! app mounts the first snapshot and diffs every later one against its
//! predecessor, re-rendering whenever a field the render read is written.
//!
//! # Locking
//!
//! The renderer sits behind a mutex that the render computation takes on
//! every run. Do not write reactive state from inside
//! [`App::with_adapter`]: the write would re-render while the mutex is held.
//! [`App::dispatch`] looks the handler up under the mutex and calls it after
//! releasing it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AppError, BoxError};
use crate::reactive::{run_tracked, Computation};
use crate::render::memory::{MemoryDom, NodeHandle};
use crate::render::{DisplayAdapter, Event, Node, Renderer};

/// A mounted, self-updating tree.
pub struct App<A: DisplayAdapter> {
    renderer: Arc<Mutex<Renderer<A>>>,
    tree: Arc<Mutex<Option<Node<A::Handle>>>>,
    container: A::Handle,
    computation: Computation,
}

impl<A> App<A>
where
    A: DisplayAdapter + Send + 'static,
    A::Handle: Send + Sync + 'static,
{
    /// Render once into `container` and keep the tree in sync with the
    /// state `render` reads.
    pub fn mount<F>(adapter: A, container: A::Handle, render: F) -> Result<Self, AppError>
    where
        F: Fn() -> Result<Node<A::Handle>, BoxError> + Send + Sync + 'static,
    {
        let renderer = Arc::new(Mutex::new(Renderer::new(adapter)));
        let tree: Arc<Mutex<Option<Node<A::Handle>>>> = Arc::new(Mutex::new(None));

        let computation = run_tracked({
            let renderer = Arc::clone(&renderer);
            let tree = Arc::clone(&tree);
            let container = container.clone();
            move || {
                // Build the snapshot before taking any lock.
                let mut next = render()?;

                let mut renderer = renderer.lock();
                let mut tree = tree.lock();
                match tree.as_ref() {
                    None => renderer.mount(&mut next, &container)?,
                    Some(previous) => renderer.diff(previous, &mut next, &container)?,
                }
                *tree = Some(next);
                Ok(())
            }
        })?;

        tracing::debug!("app mounted");
        Ok(Self {
            renderer,
            tree,
            container,
            computation,
        })
    }

    /// Number of renders so far, including the initial one.
    pub fn render_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Copy of the most recently applied snapshot.
    pub fn tree(&self) -> Option<Node<A::Handle>> {
        self.tree.lock().clone()
    }

    /// Handle of the root element, once mounted.
    pub fn root_el(&self) -> Option<A::Handle> {
        self.tree.lock().as_ref().and_then(|node| node.el().cloned())
    }

    /// Run `f` with exclusive access to the adapter.
    pub fn with_adapter<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(self.renderer.lock().adapter_mut())
    }

    /// Stop re-rendering and detach the tree from the container.
    ///
    /// The adapter stays reachable through [`App::with_adapter`].
    pub fn unmount(&self) -> Result<(), AppError> {
        self.computation.dispose();

        let mut renderer = self.renderer.lock();
        if let Some(node) = self.tree.lock().take() {
            renderer.unmount(&node, &self.container)?;
        }

        tracing::debug!("app unmounted");
        Ok(())
    }
}

impl App<MemoryDom> {
    /// Deliver `event` to the latest handler registered on `el`.
    ///
    /// Returns whether a handler ran. State the handler writes re-renders
    /// before this returns.
    pub fn dispatch(&self, el: NodeHandle, event: &Event) -> Result<bool, BoxError> {
        let handler = self.with_adapter(|dom| dom.handler(el, &event.name));
        match handler {
            Some(handler) => handler.call(event).map(|()| true),
            None => Ok(false),
        }
    }
}
