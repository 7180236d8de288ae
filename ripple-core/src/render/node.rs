//! Tree Nodes
//!
//! A [`Node`] is an immutable description of one display element: a tag, an
//! attribute map and children. The only mutable part is the mounted handle,
//! set when the node is materialized and carried forward when it is diffed
//! against the next snapshot.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{BoxError, RenderError};

/// Attribute map of a node, in declaration order.
pub type Props = IndexMap<String, PropValue>;

/// An event delivered to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Event name, lower-cased (`click`, `keyup`, ...).
    pub name: String,
    /// Current value of the target, for input-like elements.
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

type HandlerFn = dyn Fn(&Event) -> Result<(), BoxError> + Send + Sync;

/// A shared event callback. Two handlers are equal only if they are the
/// same callback.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &Event) -> Result<(), BoxError> {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0))
    }
}

/// An attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(Handler),
}

impl PropValue {
    /// `false` means "attribute not present".
    pub fn is_absent(&self) -> bool {
        matches!(self, PropValue::Bool(false))
    }

    /// Attribute text for scalar values.
    pub fn as_attribute(&self) -> Option<String> {
        match self {
            PropValue::Str(s) => Some(s.clone()),
            PropValue::Int(i) => Some(i.to_string()),
            PropValue::Float(f) => Some(f.to_string()),
            PropValue::Bool(b) => Some(b.to_string()),
            PropValue::Handler(_) => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        PropValue::Int(i64::from(i))
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        PropValue::Float(f)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<Handler> for PropValue {
    fn from(h: Handler) -> Self {
        PropValue::Handler(h)
    }
}

/// Event name for an `on`-prefixed attribute key: `onClick` -> `click`.
pub fn event_name(key: &str) -> Option<String> {
    key.strip_prefix("on")
        .filter(|rest| !rest.is_empty())
        .map(str::to_lowercase)
}

/// Children of a node: either text or a list of nodes, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Children<H> {
    Text(String),
    Nodes(Vec<Node<H>>),
}

impl<H> Default for Children<H> {
    fn default() -> Self {
        Children::Nodes(Vec::new())
    }
}

impl<H> From<&str> for Children<H> {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl<H> From<String> for Children<H> {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl<H> From<Vec<Node<H>>> for Children<H> {
    fn from(nodes: Vec<Node<H>>) -> Self {
        Children::Nodes(nodes)
    }
}

/// One element of a tree snapshot.
///
/// `H` is the display adapter's element handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<H> {
    tag: String,
    props: Option<Props>,
    children: Children<H>,
    pub(crate) el: Option<H>,
}

impl<H> Node<H> {
    /// Build an unmounted node.
    pub fn new(tag: impl Into<String>, props: Option<Props>, children: impl Into<Children<H>>) -> Self {
        Self {
            tag: tag.into(),
            props,
            children: children.into(),
            el: None,
        }
    }

    /// Add or replace one attribute.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props
            .get_or_insert_with(Props::new)
            .insert(key.into(), value.into());
        self
    }

    /// Register an event handler under `on<Event>`.
    pub fn on<F>(self, event: &str, f: F) -> Self
    where
        F: Fn(&Event) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.with_prop(format!("on{event}"), Handler::new(f))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    pub fn children(&self) -> &Children<H> {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Children<H> {
        &mut self.children
    }

    /// The live element, once mounted.
    pub fn el(&self) -> Option<&H> {
        self.el.as_ref()
    }

    /// Check this node and every descendant.
    pub fn validate_tree(&self) -> Result<(), RenderError> {
        self.validate()?;
        match &self.children {
            Children::Text(_) => Ok(()),
            Children::Nodes(children) => children.iter().try_for_each(Node::validate_tree),
        }
    }

    /// Check the tag and every attribute. Children are not visited.
    pub fn validate(&self) -> Result<(), RenderError> {
        validate_tag(&self.tag)?;

        for (key, value) in self.props.iter().flatten() {
            if key.is_empty() {
                return Err(RenderError::malformed(format!("<{}> has an empty attribute key", self.tag)));
            }
            match (event_name(key), value) {
                (Some(_), PropValue::Handler(_)) | (None, PropValue::Str(_))
                | (None, PropValue::Int(_)) | (None, PropValue::Float(_))
                | (None, PropValue::Bool(_)) => {}
                (Some(_), _) => {
                    return Err(RenderError::malformed(format!(
                        "<{}> event attribute `{key}` is not a handler",
                        self.tag
                    )));
                }
                (None, PropValue::Handler(_)) => {
                    return Err(RenderError::malformed(format!(
                        "<{}> handler bound to non-event attribute `{key}`",
                        self.tag
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Shorthand for [`Node::new`].
pub fn h<H>(tag: &str, props: Option<Props>, children: impl Into<Children<H>>) -> Node<H> {
    Node::new(tag, props, children)
}

fn validate_tag(tag: &str) -> Result<(), RenderError> {
    let mut chars = tag.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RenderError::malformed(format!("unsupported tag `{tag}`")))
    }
}

// ----------------------------------------------------------------------------
// JSON decoding
// ----------------------------------------------------------------------------

impl<H> Node<H> {
    /// Decode a node from `{"tag": .., "props": {..}, "children": ..}`.
    ///
    /// `children` must be a string or an array of nodes (missing or null
    /// means no children). Props must be scalars; `null` props are skipped.
    pub fn from_json(value: &Value) -> Result<Self, RenderError> {
        let object = value
            .as_object()
            .ok_or_else(|| RenderError::malformed("node is not an object"))?;

        let tag = object
            .get("tag")
            .and_then(Value::as_str)
            .ok_or_else(|| RenderError::malformed("node has no string `tag`"))?;

        let props = match object.get("props") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => {
                let mut props = Props::new();
                for (key, value) in map {
                    let prop = match value {
                        Value::Null => continue,
                        Value::String(s) => PropValue::Str(s.clone()),
                        Value::Bool(b) => PropValue::Bool(*b),
                        Value::Number(n) => match n.as_i64() {
                            Some(i) => PropValue::Int(i),
                            None => PropValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                        },
                        Value::Array(_) | Value::Object(_) => {
                            return Err(RenderError::malformed(format!(
                                "<{tag}> attribute `{key}` is not a scalar"
                            )));
                        }
                    };
                    props.insert(key.clone(), prop);
                }
                Some(props)
            }
            Some(other) => {
                return Err(RenderError::malformed(format!(
                    "<{tag}> props must be an object, got {other}"
                )));
            }
        };

        let children = match object.get("children") {
            None | Some(Value::Null) => Children::default(),
            Some(Value::String(text)) => Children::Text(text.clone()),
            Some(Value::Array(items)) => Children::Nodes(
                items
                    .iter()
                    .map(Node::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(other) => {
                return Err(RenderError::malformed(format!(
                    "<{tag}> children must be text or an array, got {other}"
                )));
            }
        };

        let node = Node::new(tag, props, children);
        node.validate()?;
        Ok(node)
    }

    /// Decode a node from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, RenderError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| RenderError::malformed(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type TestNode = Node<u32>;

    #[test]
    fn event_names_are_lowercased_remainder() {
        assert_eq!(event_name("onClick"), Some("click".to_string()));
        assert_eq!(event_name("onKeyUp"), Some("keyup".to_string()));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("class"), None);
    }

    #[test]
    fn handlers_compare_by_identity() {
        let a = Handler::new(|_| Ok(()));
        let b = Handler::new(|_| Ok(()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn builder_collects_props() {
        let node: TestNode = h("button", None, "go")
            .with_prop("class", "primary")
            .on("Click", |_| Ok(()));

        let props = node.props().unwrap();
        assert_eq!(props.get("class"), Some(&PropValue::from("primary")));
        assert!(matches!(props.get("onClick"), Some(PropValue::Handler(_))));
        assert!(node.validate().is_ok());
        assert!(node.el().is_none());
    }

    #[test]
    fn validate_rejects_bad_tags_and_props() {
        assert!(TestNode::new("", None, "x").validate().is_err());
        assert!(TestNode::new("1div", None, "x").validate().is_err());
        assert!(TestNode::new("my-widget", None, "x").validate().is_ok());

        let scalar_event = TestNode::new("a", None, "x").with_prop("onClick", 1);
        assert!(matches!(
            scalar_event.validate(),
            Err(RenderError::MalformedNode { .. })
        ));

        let handler_attr = TestNode::new("a", None, "x").with_prop("href", Handler::new(|_| Ok(())));
        assert!(handler_attr.validate().is_err());
    }

    #[test]
    fn validate_tree_reaches_descendants() {
        let node: TestNode = h(
            "div",
            None,
            vec![h("p", None, "ok"), h("ul", None, vec![h("1li", None, "bad")])],
        );
        assert!(node.validate().is_ok());
        assert!(matches!(
            node.validate_tree(),
            Err(RenderError::MalformedNode { .. })
        ));
    }

    #[test]
    fn decode_nested_json() {
        let node = TestNode::from_json(&json!({
            "tag": "ul",
            "props": { "id": "list", "hidden": false, "gone": null },
            "children": [
                { "tag": "li", "children": "one" },
                { "tag": "li", "props": { "tabindex": 2 }, "children": "two" }
            ]
        }))
        .unwrap();

        assert_eq!(node.tag(), "ul");
        let props = node.props().unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("hidden"), Some(&PropValue::Bool(false)));

        let Children::Nodes(items) = node.children() else {
            panic!("expected child nodes");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].children(), &Children::Text("one".into()));
        assert_eq!(
            items[1].props().and_then(|p| p.get("tabindex")),
            Some(&PropValue::Int(2))
        );
    }

    #[test]
    fn decode_rejects_malformed_children() {
        let err = TestNode::from_json(&json!({ "tag": "p", "children": 42 })).unwrap_err();
        assert!(matches!(err, RenderError::MalformedNode { .. }));

        let err = TestNode::from_json(&json!({
            "tag": "div",
            "children": [{ "tag": "span", "children": { "nested": true } }]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("children must be text or an array"));

        assert!(TestNode::from_json(&json!({ "children": "x" })).is_err());
        assert!(TestNode::from_json_str("not json").is_err());
    }

    #[test]
    fn missing_children_default_to_empty_list() {
        let node = TestNode::from_json_str(r#"{"tag": "br"}"#).unwrap();
        assert_eq!(node.children(), &Children::Nodes(Vec::new()));
    }
}
