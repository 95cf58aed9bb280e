//! Node storage.

use crate::layout::LayoutBox;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a shadow root is reachable from outside its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowRootMode {
    /// Visible to `shadow_root()` and deep queries.
    Open,
    /// Only the creator holds a reference.
    Closed,
}

impl ShadowRootMode {
    /// Parses the `shadowrootmode` attribute value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(ShadowRootMode::Open),
            "closed" => Some(ShadowRootMode::Closed),
            _ => None,
        }
    }
}

/// The DOM node type, as reported by [`crate::Document::node_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// The document node.
    Document,
    /// An element.
    Element,
    /// A text node.
    Text,
    /// A comment.
    Comment,
    /// A detached fragment.
    Fragment,
    /// A shadow root.
    ShadowRoot,
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag: SmolStr,
    pub(crate) attrs: IndexMap<SmolStr, String>,
    pub(crate) shadow_root: Option<NodeId>,
    pub(crate) props: FxHashMap<SmolStr, serde_json::Value>,
    pub(crate) layout: Option<LayoutBox>,
    pub(crate) scroll: (f64, f64),
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: IndexMap::new(),
            shadow_root: None,
            props: FxHashMap::default(),
            layout: None,
            scroll: (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document { scroll: (f64, f64) },
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
    ShadowRoot { host: NodeId, mode: ShadowRootMode },
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Document { .. } => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::Fragment,
            NodeKind::ShadowRoot { .. } => NodeType::ShadowRoot,
        }
    }

    pub(crate) fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }
}
