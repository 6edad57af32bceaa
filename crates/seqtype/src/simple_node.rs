//! Small immutable in-memory tree implementing [`XdmNode`], for tests,
//! benches and quick prototypes.
//!
//! ```
//! use platynui_seqtype::simple_node::{attr, elem, text};
//! use platynui_seqtype::XdmNode;
//!
//! // <root id="r"><child>Hello</child></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.string_value(), "Hello");
//! assert_eq!(root.children()[0].parent(), Some(root.clone()));
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>, // text / attribute / comment content
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

/// Arc-backed node; equality is identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: &str) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value: Some(value.to_string()),
            parent: OnceLock::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }))
    }

    pub fn parent(&self) -> Option<SimpleNode> {
        self.0.parent.get()?.upgrade().map(SimpleNode)
    }

    pub fn children(&self) -> &[SimpleNode] {
        &self.0.children
    }

    pub fn attributes(&self) -> &[SimpleNode] {
        &self.0.attributes
    }
}

fn no_ns(local: &str) -> QName {
    QName {
        prefix: None,
        local: local.to_string(),
        ns_uri: None,
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(match child.into() {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        });
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    /// Finalize and link parents. A node already attached elsewhere keeps
    /// its first parent.
    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            parent: OnceLock::new(),
            attributes: self.attributes,
            children: self.children,
        }));
        for n in node.0.attributes.iter().chain(&node.0.children) {
            let _ = n.0.parent.set(Arc::downgrade(&node.0));
        }
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}
impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}
impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

// Convenience helpers for concise test code
pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None)
}
pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(no_ns(name)))
}
/// Element in namespace `uri`, written with `prefix`.
pub fn elem_ns(prefix: &str, uri: &str, local: &str) -> SimpleNodeBuilder {
    let name = QName {
        prefix: Some(prefix.to_string()),
        local: local.to_string(),
        ns_uri: Some(uri.to_string()),
    };
    SimpleNodeBuilder::new(NodeKind::Element, Some(name))
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Attribute, Some(no_ns(name)), v)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Text, None, v)
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Comment, None, v)
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.kind() {
            NodeKind::Element | NodeKind::Document => {
                fn dfs(n: &SimpleNode, out: &mut String) {
                    if n.kind() == NodeKind::Text
                        && let Some(v) = &n.0.value
                    {
                        out.push_str(v);
                    }
                    for c in &n.0.children {
                        dfs(c, out);
                    }
                }
                let mut out = String::new();
                dfs(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }
}
