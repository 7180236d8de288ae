//! In-Memory Display Tree
//!
//! A headless [`DisplayAdapter`] backed by an arena of nodes. Every
//! operation is appended to a log, which makes it the tool of choice for
//! asserting exactly which mutations a diff produced.

use std::fmt::Write as _;

use indexmap::IndexMap;
use thiserror::Error;

use super::adapter::DisplayAdapter;
use super::node::{Event, Handler};
use crate::error::BoxError;

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateElement { el: NodeHandle, tag: String },
    CreateText { el: NodeHandle, text: String },
    SetAttribute { el: NodeHandle, key: String, value: String },
    RemoveAttribute { el: NodeHandle, key: String },
    AddListener { el: NodeHandle, event: String },
    Insert { el: NodeHandle, parent: NodeHandle, anchor: Option<NodeHandle> },
    Remove { el: NodeHandle, parent: NodeHandle },
    SetText { el: NodeHandle, text: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryDomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeHandle),

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { child: NodeHandle, parent: NodeHandle },

    #[error("text node {0:?} cannot have children or attributes")]
    TextNode(NodeHandle),

    #[error("injected failure in {0}")]
    Injected(&'static str),
}

enum Kind {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        listeners: IndexMap<String, Vec<Handler>>,
    },
    Text(String),
}

struct Entry {
    kind: Kind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// Headless display tree.
pub struct MemoryDom {
    nodes: Vec<Entry>,
    root: NodeHandle,
    ops: Vec<Op>,
    fail_on: Option<&'static str>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// An empty tree with a single `<root>` element.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeHandle(0),
            ops: Vec::new(),
            fail_on: None,
        };
        dom.root = dom.alloc(Kind::Element {
            tag: "root".to_string(),
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
        });
        dom
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Operations recorded since the last [`MemoryDom::clear_ops`].
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Make every subsequent call to `op` fail.
    pub fn fail_on(&mut self, op: &'static str) {
        self.fail_on = Some(op);
    }

    pub fn children(&self, el: NodeHandle) -> &[NodeHandle] {
        self.nodes
            .get(el.0)
            .map_or(&[][..], |entry| entry.children.as_slice())
    }

    pub fn parent(&self, el: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(el.0).and_then(|entry| entry.parent)
    }

    pub fn tag(&self, el: NodeHandle) -> Option<&str> {
        match &self.nodes.get(el.0)?.kind {
            Kind::Element { tag, .. } => Some(tag),
            Kind::Text(_) => None,
        }
    }

    pub fn attribute(&self, el: NodeHandle, key: &str) -> Option<&str> {
        match &self.nodes.get(el.0)?.kind {
            Kind::Element { attributes, .. } => attributes.get(key).map(String::as_str),
            Kind::Text(_) => None,
        }
    }

    /// Handlers registered for `event` on `el`, oldest first.
    pub fn listeners(&self, el: NodeHandle, event: &str) -> Vec<Handler> {
        match self.nodes.get(el.0).map(|entry| &entry.kind) {
            Some(Kind::Element { listeners, .. }) => {
                listeners.get(event).cloned().unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// The most recently registered handler for `event` on `el`.
    pub fn handler(&self, el: NodeHandle, event: &str) -> Option<Handler> {
        match &self.nodes.get(el.0)?.kind {
            Kind::Element { listeners, .. } => listeners.get(event)?.last().cloned(),
            Kind::Text(_) => None,
        }
    }

    /// Invoke the most recently registered handler for `event` on `el`.
    ///
    /// Returns whether a handler ran. When the tree is owned by an
    /// [`App`](crate::app::App), use [`App::dispatch`](crate::app::App::dispatch)
    /// instead: the handler may write state that re-renders into this tree.
    pub fn dispatch(&self, el: NodeHandle, event: &Event) -> Result<bool, BoxError> {
        match self.handler(el, &event.name) {
            Some(handler) => handler.call(event).map(|()| true),
            None => Ok(false),
        }
    }

    /// Concatenated text of `el` and its descendants.
    pub fn text_content(&self, el: NodeHandle) -> String {
        let mut out = String::new();
        self.collect_text(el, &mut out);
        out
    }

    fn collect_text(&self, el: NodeHandle, out: &mut String) {
        let Some(entry) = self.nodes.get(el.0) else {
            return;
        };
        match &entry.kind {
            Kind::Text(text) => out.push_str(text),
            Kind::Element { .. } => {
                for child in &entry.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Serialize the subtree at `el` as markup. Attributes keep insertion
    /// order; listeners are not shown.
    pub fn to_html(&self, el: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(el, &mut out);
        out
    }

    fn write_html(&self, el: NodeHandle, out: &mut String) {
        let Some(entry) = self.nodes.get(el.0) else {
            return;
        };
        match &entry.kind {
            Kind::Text(text) => out.push_str(text),
            Kind::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attributes {
                    let _ = write!(out, r#" {key}="{value}""#);
                }
                out.push('>');
                for child in &entry.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn alloc(&mut self, kind: Kind) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(Entry {
            kind,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn check(&self, op: &'static str) -> Result<(), MemoryDomError> {
        match self.fail_on {
            Some(failing) if failing == op => Err(MemoryDomError::Injected(op)),
            _ => Ok(()),
        }
    }

    fn entry(&self, el: NodeHandle) -> Result<&Entry, MemoryDomError> {
        self.nodes.get(el.0).ok_or(MemoryDomError::UnknownNode(el))
    }

    fn entry_mut(&mut self, el: NodeHandle) -> Result<&mut Entry, MemoryDomError> {
        self.nodes.get_mut(el.0).ok_or(MemoryDomError::UnknownNode(el))
    }

    fn element_mut(
        &mut self,
        el: NodeHandle,
    ) -> Result<(&mut IndexMap<String, String>, &mut IndexMap<String, Vec<Handler>>), MemoryDomError> {
        match &mut self.entry_mut(el)?.kind {
            Kind::Element {
                attributes,
                listeners,
                ..
            } => Ok((attributes, listeners)),
            Kind::Text(_) => Err(MemoryDomError::TextNode(el)),
        }
    }

    fn detach(&mut self, el: NodeHandle) -> Result<(), MemoryDomError> {
        if let Some(parent) = self.entry(el)?.parent {
            self.entry_mut(parent)?.children.retain(|c| *c != el);
            self.entry_mut(el)?.parent = None;
        }
        Ok(())
    }
}

impl DisplayAdapter for MemoryDom {
    type Handle = NodeHandle;
    type Error = MemoryDomError;

    fn create_element(&mut self, tag: &str) -> Result<NodeHandle, MemoryDomError> {
        self.check("create_element")?;
        let el = self.alloc(Kind::Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
        });
        self.ops.push(Op::CreateElement {
            el,
            tag: tag.to_string(),
        });
        Ok(el)
    }

    fn create_text_node(&mut self, text: &str) -> Result<NodeHandle, MemoryDomError> {
        self.check("create_text_node")?;
        let el = self.alloc(Kind::Text(text.to_string()));
        self.ops.push(Op::CreateText {
            el,
            text: text.to_string(),
        });
        Ok(el)
    }

    fn set_attribute(&mut self, el: &NodeHandle, key: &str, value: &str) -> Result<(), MemoryDomError> {
        self.check("set_attribute")?;
        let (attributes, _) = self.element_mut(*el)?;
        attributes.insert(key.to_string(), value.to_string());
        self.ops.push(Op::SetAttribute {
            el: *el,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, el: &NodeHandle, key: &str) -> Result<(), MemoryDomError> {
        self.check("remove_attribute")?;
        let (attributes, _) = self.element_mut(*el)?;
        attributes.shift_remove(key);
        self.ops.push(Op::RemoveAttribute {
            el: *el,
            key: key.to_string(),
        });
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        el: &NodeHandle,
        event: &str,
        handler: &Handler,
    ) -> Result<(), MemoryDomError> {
        self.check("add_event_listener")?;
        let (_, listeners) = self.element_mut(*el)?;
        listeners
            .entry(event.to_string())
            .or_default()
            .push(handler.clone());
        self.ops.push(Op::AddListener {
            el: *el,
            event: event.to_string(),
        });
        Ok(())
    }

    fn insert(
        &mut self,
        el: &NodeHandle,
        parent: &NodeHandle,
        anchor: Option<&NodeHandle>,
    ) -> Result<(), MemoryDomError> {
        self.check("insert")?;
        if matches!(self.entry(*parent)?.kind, Kind::Text(_)) {
            return Err(MemoryDomError::TextNode(*parent));
        }
        self.entry(*el)?;
        self.detach(*el)?;

        let children = &mut self.entry_mut(*parent)?.children;
        let position = match anchor {
            Some(anchor) => children
                .iter()
                .position(|c| c == anchor)
                .ok_or(MemoryDomError::NotAChild {
                    child: *anchor,
                    parent: *parent,
                })?,
            None => children.len(),
        };
        children.insert(position, *el);
        self.entry_mut(*el)?.parent = Some(*parent);

        self.ops.push(Op::Insert {
            el: *el,
            parent: *parent,
            anchor: anchor.copied(),
        });
        Ok(())
    }

    fn remove(&mut self, el: &NodeHandle, parent: &NodeHandle) -> Result<(), MemoryDomError> {
        self.check("remove")?;
        if self.entry(*el)?.parent != Some(*parent) {
            return Err(MemoryDomError::NotAChild {
                child: *el,
                parent: *parent,
            });
        }
        self.detach(*el)?;
        self.ops.push(Op::Remove {
            el: *el,
            parent: *parent,
        });
        Ok(())
    }

    fn set_text(&mut self, el: &NodeHandle, text: &str) -> Result<(), MemoryDomError> {
        self.check("set_text")?;
        let entry = self.entry_mut(*el)?;
        if let Kind::Text(current) = &mut entry.kind {
            *current = text.to_string();
        } else {
            // Element text content replaces every child.
            let old_children = std::mem::take(&mut self.entry_mut(*el)?.children);
            for child in old_children {
                self.entry_mut(child)?.parent = None;
            }
            if !text.is_empty() {
                let text_node = self.alloc(Kind::Text(text.to_string()));
                self.entry_mut(text_node)?.parent = Some(*el);
                self.entry_mut(*el)?.children.push(text_node);
            }
        }
        self.ops.push(Op::SetText {
            el: *el,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn insert_before_anchor() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let a = dom.create_element("a").unwrap();
        let b = dom.create_element("b").unwrap();

        dom.insert(&a, &root, None).unwrap();
        dom.insert(&b, &root, Some(&a)).unwrap();

        assert_eq!(dom.children(root), &[b, a]);
        assert_eq!(dom.parent(a), Some(root));
    }

    #[test]
    fn remove_requires_parent() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let a = dom.create_element("a").unwrap();

        assert_eq!(
            dom.remove(&a, &root),
            Err(MemoryDomError::NotAChild {
                child: a,
                parent: root
            })
        );

        dom.insert(&a, &root, None).unwrap();
        dom.remove(&a, &root).unwrap();
        assert!(dom.children(root).is_empty());
        assert_eq!(dom.parent(a), None);
    }

    #[test]
    fn set_text_on_element_replaces_children() {
        let mut dom = MemoryDom::new();
        let root = dom.root();
        let p = dom.create_element("p").unwrap();
        let t = dom.create_text_node("one").unwrap();
        dom.insert(&t, &p, None).unwrap();
        dom.insert(&p, &root, None).unwrap();

        dom.set_text(&p, "two").unwrap();
        assert_eq!(dom.to_html(root), "<root><p>two</p></root>");

        dom.set_text(&p, "").unwrap();
        assert!(dom.children(p).is_empty());
    }

    #[test]
    fn dispatch_runs_latest_listener() {
        let mut dom = MemoryDom::new();
        let button = dom.create_element("button").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = Handler::new(|_| Err("stale handler".into()));
        let second = Handler::new({
            let hits = hits.clone();
            move |event| {
                assert_eq!(event.name, "click");
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        dom.add_event_listener(&button, "click", &first).unwrap();
        dom.add_event_listener(&button, "click", &second).unwrap();

        assert!(dom.dispatch(button, &Event::new("click")).unwrap());
        assert!(!dom.dispatch(button, &Event::new("keyup")).unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dom.listeners(button, "click").len(), 2);
    }

    #[test]
    fn injected_failure() {
        let mut dom = MemoryDom::new();
        dom.fail_on("create_element");
        assert_eq!(
            dom.create_element("div"),
            Err(MemoryDomError::Injected("create_element"))
        );
        assert!(dom.ops().is_empty());
    }
}
