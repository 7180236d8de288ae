//! Mount and Diff
//!
//! The renderer materializes node trees through a [`DisplayAdapter`] and
//! reconciles a mounted tree against the next snapshot in place.
//!
//! # Algorithm
//!
//! `diff(old, new)` walks both trees in lockstep:
//!
//! 1. Different tags: mount `new` in front of `old`'s element and remove the
//!    old element. The whole subtree is rebuilt.
//! 2. Same tag: the element is reused. Attributes that changed are
//!    re-applied, attributes that disappeared are removed.
//! 3. Children are reconciled by shape:
//!    - text -> text: set the text if it changed
//!    - nodes -> text: remove every old child, set the text
//!    - text -> nodes: clear the text, mount every new child
//!    - nodes -> nodes: diff the common prefix position by position, then
//!      remove the surplus old suffix or mount the extra new suffix
//!
//! Children are matched by position only. Reordering a list is seen as a
//! series of per-position edits, never as a move.

use super::adapter::DisplayAdapter;
use super::node::{event_name, Children, Node, PropValue, Props};
use crate::error::RenderError;

/// Applies node trees to a display adapter.
pub struct Renderer<A: DisplayAdapter> {
    adapter: A,
}

impl<A: DisplayAdapter> Renderer<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Materialize `node` as the last child of `parent`.
    ///
    /// The whole tree is validated first; a malformed node anywhere in it
    /// fails the mount before the adapter is touched.
    pub fn mount(&mut self, node: &mut Node<A::Handle>, parent: &A::Handle) -> Result<(), RenderError> {
        node.validate_tree()?;
        self.mount_before(node, parent, None)
    }

    fn mount_before(
        &mut self,
        node: &mut Node<A::Handle>,
        parent: &A::Handle,
        anchor: Option<&A::Handle>,
    ) -> Result<(), RenderError> {
        let el = self
            .adapter
            .create_element(node.tag())
            .map_err(RenderError::adapter("create_element"))?;

        if let Some(props) = node.props() {
            for (key, value) in props {
                if !value.is_absent() {
                    self.apply_prop(&el, key, value)?;
                }
            }
        }

        match node.children_mut() {
            Children::Nodes(children) => {
                for child in children {
                    self.mount_before(child, &el, None)?;
                }
            }
            Children::Text(text) => {
                let text_node = self
                    .adapter
                    .create_text_node(text)
                    .map_err(RenderError::adapter("create_text_node"))?;
                self.adapter
                    .insert(&text_node, &el, None)
                    .map_err(RenderError::adapter("insert"))?;
            }
        }

        node.el = Some(el.clone());
        self.adapter
            .insert(&el, parent, anchor)
            .map_err(RenderError::adapter("insert"))?;

        tracing::trace!(tag = node.tag(), "mounted node");
        Ok(())
    }

    /// Reconcile the mounted `old` against `new`, which takes over `old`'s
    /// element (or a fresh one, if the tag changed). `parent` is the element
    /// both nodes live under.
    ///
    /// `new` is validated in full before anything is mutated, so a
    /// `MalformedNode` error leaves the display tree matching `old`.
    pub fn diff(
        &mut self,
        old: &Node<A::Handle>,
        new: &mut Node<A::Handle>,
        parent: &A::Handle,
    ) -> Result<(), RenderError> {
        new.validate_tree()?;
        self.patch(old, new, parent)
    }

    fn patch(
        &mut self,
        old: &Node<A::Handle>,
        new: &mut Node<A::Handle>,
        parent: &A::Handle,
    ) -> Result<(), RenderError> {
        let el = old.el().cloned().ok_or_else(|| RenderError::Unmounted {
            tag: old.tag().to_string(),
        })?;

        if old.tag() != new.tag() {
            tracing::debug!(from = old.tag(), to = new.tag(), "tag changed, replacing subtree");
            self.mount_before(new, parent, Some(&el))?;
            return self
                .adapter
                .remove(&el, parent)
                .map_err(RenderError::adapter("remove"));
        }

        new.el = Some(el.clone());

        self.patch_props(&el, old.props(), new.props())?;
        self.patch_children(&el, old.children(), new.children_mut())
    }

    fn patch_props(
        &mut self,
        el: &A::Handle,
        old: Option<&Props>,
        new: Option<&Props>,
    ) -> Result<(), RenderError> {
        let empty = Props::new();
        let old = old.unwrap_or(&empty);
        let new = new.unwrap_or(&empty);

        for (key, value) in new {
            if value.is_absent() {
                continue;
            }
            if old.get(key) != Some(value) {
                self.apply_prop(el, key, value)?;
            }
        }

        for (key, previous) in old {
            if previous.is_absent() {
                continue;
            }
            if new.get(key).map_or(true, PropValue::is_absent) {
                self.remove_prop(el, key)?;
            }
        }

        Ok(())
    }

    fn apply_prop(&mut self, el: &A::Handle, key: &str, value: &PropValue) -> Result<(), RenderError> {
        match (event_name(key), value) {
            (Some(event), PropValue::Handler(handler)) => self
                .adapter
                .add_event_listener(el, &event, handler)
                .map_err(RenderError::adapter("add_event_listener")),
            (None, value) => match value.as_attribute() {
                Some(text) => self
                    .adapter
                    .set_attribute(el, key, &text)
                    .map_err(RenderError::adapter("set_attribute")),
                None => Err(RenderError::malformed(format!(
                    "handler bound to non-event attribute `{key}`"
                ))),
            },
            (Some(_), _) => Err(RenderError::malformed(format!(
                "event attribute `{key}` is not a handler"
            ))),
        }
    }

    fn remove_prop(&mut self, el: &A::Handle, key: &str) -> Result<(), RenderError> {
        if let Some(event) = event_name(key) {
            // The adapter has no way to drop a listener.
            tracing::debug!(%event, "event attribute removed, listener left in place");
            return Ok(());
        }
        self.adapter
            .remove_attribute(el, key)
            .map_err(RenderError::adapter("remove_attribute"))
    }

    fn patch_children(
        &mut self,
        el: &A::Handle,
        old: &Children<A::Handle>,
        new: &mut Children<A::Handle>,
    ) -> Result<(), RenderError> {
        match (old, new) {
            (Children::Text(previous), Children::Text(next)) => {
                if *previous != *next {
                    self.set_text(el, next)?;
                }
                Ok(())
            }
            (Children::Nodes(previous), Children::Text(next)) => {
                for child in previous {
                    self.unmount(child, el)?;
                }
                self.set_text(el, next)
            }
            (Children::Text(_), Children::Nodes(next)) => {
                self.set_text(el, "")?;
                for child in next {
                    self.mount_before(child, el, None)?;
                }
                Ok(())
            }
            (Children::Nodes(previous), Children::Nodes(next)) => {
                let common = previous.len().min(next.len());

                for (old_child, new_child) in previous.iter().zip(next.iter_mut()) {
                    self.patch(old_child, new_child, el)?;
                }

                for old_child in &previous[common..] {
                    self.unmount(old_child, el)?;
                }

                for new_child in &mut next[common..] {
                    self.mount_before(new_child, el, None)?;
                }

                if previous.len() != next.len() {
                    tracing::trace!(
                        from = previous.len(),
                        to = next.len(),
                        "resized child list"
                    );
                }
                Ok(())
            }
        }
    }

    fn set_text(&mut self, el: &A::Handle, text: &str) -> Result<(), RenderError> {
        self.adapter
            .set_text(el, text)
            .map_err(RenderError::adapter("set_text"))
    }

    /// Detach a mounted node from `parent`.
    pub fn unmount(&mut self, node: &Node<A::Handle>, parent: &A::Handle) -> Result<(), RenderError> {
        let el = node.el().ok_or_else(|| RenderError::Unmounted {
            tag: node.tag().to_string(),
        })?;
        self.adapter
            .remove(el, parent)
            .map_err(RenderError::adapter("remove"))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::memory::{MemoryDom, NodeHandle, Op};
    use crate::render::node::{h, Handler};

    fn item(text: &str) -> Node<NodeHandle> {
        h("li", None, text)
    }

    fn list(items: &[&str]) -> Node<NodeHandle> {
        h("ul", None, items.iter().map(|t| item(t)).collect::<Vec<_>>())
    }

    fn mounted(node: &mut Node<NodeHandle>) -> Renderer<MemoryDom> {
        let mut renderer = Renderer::new(MemoryDom::new());
        let root = renderer.adapter().root();
        renderer.mount(node, &root).unwrap();
        renderer.adapter_mut().clear_ops();
        renderer
    }

    #[test]
    fn mount_builds_tree() {
        let mut node = h("div", None, vec![h("p", None, "hello")]).with_prop("id", "app");
        let renderer = mounted(&mut node);
        let dom = renderer.adapter();

        assert_eq!(
            dom.to_html(dom.root()),
            r#"<root><div id="app"><p>hello</p></div></root>"#
        );
        assert!(node.el().is_some());
    }

    #[test]
    fn unchanged_snapshot_is_a_no_op() {
        let mut old = h("div", None, vec![item("a"), item("b")])
            .with_prop("class", "x")
            .on("Click", |_| Ok(()));
        let mut new = old.clone();
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        assert!(renderer.adapter().ops().is_empty());
        assert_eq!(new.el(), old.el());
    }

    #[test]
    fn props_changed_and_removed() {
        let mut old = h("a", None, "x")
            .with_prop("href", "/one")
            .with_prop("title", "t")
            .with_prop("hidden", true);
        let mut new = h("a", None, "x")
            .with_prop("href", "/two")
            .with_prop("title", "t")
            .with_prop("hidden", false);
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        let el = *new.el().unwrap();
        assert_eq!(
            renderer.adapter().ops(),
            &[
                Op::SetAttribute {
                    el,
                    key: "href".into(),
                    value: "/two".into()
                },
                Op::RemoveAttribute {
                    el,
                    key: "hidden".into()
                },
            ]
        );
    }

    #[test]
    fn changed_handler_is_registered() {
        let mut old: Node<NodeHandle> = h("button", None, "go").on("Click", |_| Ok(()));
        let mut new: Node<NodeHandle> = h("button", None, "go")
            .with_prop("onClick", Handler::new(|_| Ok(())));
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        let el = *new.el().unwrap();
        assert_eq!(
            renderer.adapter().ops(),
            &[Op::AddListener {
                el,
                event: "click".into()
            }]
        );
    }

    #[test]
    fn text_change_sets_text_once() {
        let mut old = h("p", None, "before");
        let mut new = h("p", None, "after");
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        let el = *new.el().unwrap();
        assert_eq!(
            renderer.adapter().ops(),
            &[Op::SetText {
                el,
                text: "after".into()
            }]
        );
        assert_eq!(renderer.adapter().text_content(el), "after");
    }

    #[test]
    fn shrinking_list_removes_suffix_only() {
        let mut old = list(&["a", "b", "c", "d", "e"]);
        let mut new = list(&["a", "b", "c"]);
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        let Children::Nodes(old_items) = old.children() else {
            unreachable!()
        };
        let ul = *old.el().unwrap();
        let removed: Vec<_> = old_items[3..].iter().map(|n| *n.el().unwrap()).collect();

        renderer.diff(&old, &mut new, &root).unwrap();

        assert_eq!(
            renderer.adapter().ops(),
            &[
                Op::Remove {
                    el: removed[0],
                    parent: ul
                },
                Op::Remove {
                    el: removed[1],
                    parent: ul
                },
            ]
        );

        // Surviving positions keep their elements.
        let Children::Nodes(new_items) = new.children() else {
            unreachable!()
        };
        for (o, n) in old_items.iter().zip(new_items) {
            assert_eq!(o.el(), n.el());
        }
    }

    #[test]
    fn growing_list_appends_suffix_only() {
        let mut old = list(&["a", "b", "c"]);
        let mut new = list(&["a", "b", "c", "d", "e"]);
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        let dom = renderer.adapter();
        let created = dom
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::CreateElement { .. }))
            .count();
        assert_eq!(created, 2);

        let ul = *new.el().unwrap();
        assert_eq!(dom.children(ul).len(), 5);
        assert_eq!(dom.text_content(dom.children(ul)[4]), "e");
    }

    #[test]
    fn tag_change_replaces_in_place() {
        let mut old = h("div", None, vec![item("a"), h("div", None, "mid").with_prop("class", "c"), item("z")]);
        let mut new = h("div", None, vec![item("a"), h("span", None, "mid").with_prop("class", "c"), item("z")]);
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut new, &root).unwrap();

        let dom = renderer.adapter();
        let creates: Vec<_> = dom
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::CreateElement { tag, .. } => Some(tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(creates, vec!["span"]);
        assert!(dom
            .ops()
            .iter()
            .any(|op| matches!(op, Op::SetAttribute { key, .. } if key == "class")));
        assert_eq!(
            dom.to_html(dom.root()),
            r#"<root><div><li>a</li><span class="c">mid</span><li>z</li></div></root>"#
        );
    }

    #[test]
    fn switching_between_text_and_nodes() {
        let mut old = h("div", None, vec![item("a"), item("b")]);
        let mut as_text = h("div", None, "plain");
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        renderer.diff(&old, &mut as_text, &root).unwrap();
        let dom = renderer.adapter();
        assert_eq!(dom.to_html(dom.root()), "<root><div>plain</div></root>");

        let mut back = h("div", None, vec![item("c")]);
        renderer.diff(&as_text, &mut back, &root).unwrap();
        let dom = renderer.adapter();
        assert_eq!(dom.to_html(dom.root()), "<root><div><li>c</li></div></root>");
    }

    #[test]
    fn diff_requires_mounted_old() {
        let old = item("a");
        let mut new = item("b");
        let mut renderer = Renderer::new(MemoryDom::new());
        let root = renderer.adapter().root();

        let err = renderer.diff(&old, &mut new, &root).unwrap_err();
        assert!(matches!(err, RenderError::Unmounted { .. }));
    }

    #[test]
    fn malformed_node_is_rejected_before_touching_adapter() {
        let mut node: Node<NodeHandle> = h("div", None, "x").with_prop("onClick", "nope");
        let mut renderer = Renderer::new(MemoryDom::new());
        let root = renderer.adapter().root();

        let err = renderer.mount(&mut node, &root).unwrap_err();
        assert!(matches!(err, RenderError::MalformedNode { .. }));
        assert!(renderer.adapter().ops().is_empty());
    }

    #[test]
    fn malformed_descendant_fails_diff_without_mutation() {
        let mut old = h("div", None, vec![h("p", None, "x").with_prop("class", "a"), item("y")]);
        let mut new = h(
            "div",
            None,
            vec![h("p", None, "x").with_prop("class", "b"), h("1bad", None, "y")],
        );
        let mut renderer = mounted(&mut old);
        let root = renderer.adapter().root();

        let err = renderer.diff(&old, &mut new, &root).unwrap_err();
        assert!(matches!(err, RenderError::MalformedNode { .. }));
        assert!(renderer.adapter().ops().is_empty());
        assert!(new.el().is_none());

        let dom = renderer.adapter();
        assert_eq!(
            dom.to_html(dom.root()),
            r#"<root><div><p class="a">x</p><li>y</li></div></root>"#
        );
    }

    #[test]
    fn adapter_failure_propagates() {
        let mut node = h("div", None, vec![item("a")]);
        let mut dom = MemoryDom::new();
        dom.fail_on("insert");
        let mut renderer = Renderer::new(dom);
        let root = renderer.adapter().root();

        let err = renderer.mount(&mut node, &root).unwrap_err();
        assert!(matches!(err, RenderError::Adapter { op: "insert", .. }));
    }
}
