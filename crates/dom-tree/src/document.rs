//! The document handle and tree operations.

use crate::error::DomError;
use crate::event::ListenerStore;
use crate::layout::LayoutBox;
use crate::node::{ElementData, NodeData, NodeId, NodeKind, NodeType, ShadowRootMode};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

pub(crate) struct DomTree {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) listeners: ListenerStore,
    pub(crate) head: NodeId,
    pub(crate) body: NodeId,
}

impl DomTree {
    pub(crate) fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.index())
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(NodeData::element)
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.node_mut(id).and_then(NodeData::element_mut)
    }

    pub(crate) fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind));
        id
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub(crate) fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Parent in the composed tree: a shadow root's parent is its host.
    pub(crate) fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::ShadowRoot { host, .. }) => Some(*host),
            Some(_) => self.parent(id),
            None => None,
        }
    }

    pub(crate) fn tree_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether `ancestor` is `node` or one of its light-tree ancestors.
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether `ancestor` is `node` or a composed-tree ancestor of it.
    pub(crate) fn composed_contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.composed_parent(id);
        }
        false
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    pub(crate) fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
    ) -> Result<(), DomError> {
        if self.node(parent).is_none() {
            return Err(DomError::UnknownNode(parent.to_string()));
        }
        if self.node(child).is_none() {
            return Err(DomError::UnknownNode(child.to_string()));
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyCycle {
                child: child.to_string(),
                parent: parent.to_string(),
            });
        }
        let moved: Vec<NodeId> = match self.node(child).map(|n| &n.kind) {
            Some(NodeKind::Fragment) => self.children(child).to_vec(),
            Some(NodeKind::Document { .. }) | Some(NodeKind::ShadowRoot { .. }) => {
                return Err(DomError::HierarchyCycle {
                    child: child.to_string(),
                    parent: parent.to_string(),
                })
            }
            _ => vec![child],
        };
        let mut at = index;
        for node in moved {
            if let (Some(i), Some(current)) = (at, self.parent(node)) {
                // Moving a node that sits before the insertion point shifts it.
                if current == parent {
                    let old = self.children(parent).iter().position(|&c| c == node);
                    if let Some(old) = old {
                        if old < i {
                            at = Some(i - 1);
                        }
                    }
                }
            }
            self.detach(node);
            let Some(parent_node) = self.node_mut(parent) else {
                break;
            };
            match at {
                Some(i) => {
                    let i = i.min(parent_node.children.len());
                    parent_node.children.insert(i, node);
                    at = Some(i + 1);
                }
                None => parent_node.children.push(node),
            }
            if let Some(n) = self.node_mut(node) {
                n.parent = Some(parent);
            }
        }
        Ok(())
    }

    /// Preorder light-tree descendants of `root`, excluding `root`.
    pub(crate) fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Path of child indices from the composed root. A shadow root sorts
    /// after all light children of its host.
    fn composed_path_indices(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        loop {
            match self.node(current).map(|n| &n.kind) {
                Some(NodeKind::ShadowRoot { host, .. }) => {
                    path.push(self.children(*host).len());
                    current = *host;
                }
                Some(_) => match self.parent(current) {
                    Some(parent) => {
                        let index = self
                            .children(parent)
                            .iter()
                            .position(|&c| c == current)
                            .unwrap_or(0);
                        path.push(index);
                        current = parent;
                    }
                    None => break,
                },
                None => break,
            }
        }
        path.push(current.index());
        path.reverse();
        path
    }

    pub(crate) fn compare_position(&self, a: NodeId, b: NodeId) -> Ordering {
        self.composed_path_indices(a)
            .cmp(&self.composed_path_indices(b))
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) | Some(NodeKind::Comment(text)) => text.clone(),
            Some(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let Some(NodeKind::Text(text)) = self.node(node).map(|n| &n.kind) {
                        out.push_str(text);
                    }
                }
                out
            }
            None => String::new(),
        }
    }
}

/// A shared handle to an in-memory document.
///
/// Nodes are addressed by [`NodeId`]. Every method borrows the tree only for
/// its own duration, so event listeners and other callbacks may freely call
/// back into the document.
#[derive(Clone)]
pub struct Document {
    pub(crate) tree: Rc<RefCell<DomTree>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.borrow().nodes.len())
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// The document node id.
    pub const ROOT: NodeId = NodeId(0);

    /// Creates a document with empty `<html>`, `<head>` and `<body>`.
    pub fn new() -> Self {
        let mut tree = DomTree {
            nodes: Vec::new(),
            listeners: ListenerStore::default(),
            head: NodeId(0),
            body: NodeId(0),
        };
        let root = tree.push(NodeKind::Document { scroll: (0.0, 0.0) });
        let html = tree.push(NodeKind::Element(ElementData::new("html")));
        let head = tree.push(NodeKind::Element(ElementData::new("head")));
        let body = tree.push(NodeKind::Element(ElementData::new("body")));
        for (parent, child) in [(root, html), (html, head), (html, body)] {
            tree.nodes[child.index()].parent = Some(parent);
            tree.nodes[parent.index()].children.push(child);
        }
        tree.head = head;
        tree.body = body;
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// Creates a document whose body holds the parsed `html`.
    pub fn from_html(html: &str) -> Self {
        let doc = Self::new();
        doc.set_inner_html(doc.body(), html);
        doc
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut DomTree) -> R) -> R {
        f(&mut self.tree.borrow_mut())
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        NodeId(1)
    }

    /// The `<head>` element.
    pub fn head(&self) -> NodeId {
        self.with(|t| t.head)
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.with(|t| t.body)
    }

    // === Creation ===

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.with_mut(|t| t.push(NodeKind::Element(ElementData::new(tag))))
    }

    /// Creates a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.with_mut(|t| t.push(NodeKind::Text(text.to_string())))
    }

    /// Creates a detached comment.
    pub fn create_comment(&self, text: &str) -> NodeId {
        self.with_mut(|t| t.push(NodeKind::Comment(text.to_string())))
    }

    /// Creates an empty fragment.
    pub fn create_fragment(&self) -> NodeId {
        self.with_mut(|t| t.push(NodeKind::Fragment))
    }

    /// Copies a node, with its subtree when `deep`. Shadow roots and
    /// listeners are not copied.
    pub fn clone_node(&self, id: NodeId, deep: bool) -> NodeId {
        self.with_mut(|t| clone_into(t, id, deep))
    }

    // === Node info ===

    /// The node's type, or `None` for an id from another document.
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.with(|t| t.node(id).map(NodeData::node_type))
    }

    /// Whether the node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.with(|t| t.is_element(id))
    }

    /// The lowercase tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<SmolStr> {
        self.with(|t| t.element(id).map(|e| e.tag.clone()))
    }

    /// The data of a text or comment node.
    pub fn node_text(&self, id: NodeId) -> Option<String> {
        self.with(|t| match t.node(id).map(|n| &n.kind) {
            Some(NodeKind::Text(s)) | Some(NodeKind::Comment(s)) => Some(s.clone()),
            _ => None,
        })
    }

    /// Replaces the data of a text or comment node.
    pub fn set_node_text(&self, id: NodeId, text: &str) {
        self.with_mut(|t| match t.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Text(s)) | Some(NodeKind::Comment(s)) => {
                if s != text {
                    *s = text.to_string();
                }
            }
            _ => {}
        })
    }

    // === Tree ===

    /// The parent node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| t.parent(id))
    }

    /// The parent, if it is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| t.parent(id).filter(|&p| t.is_element(p)))
    }

    /// The parent in the composed tree (a shadow root's host).
    pub fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| t.composed_parent(id))
    }

    /// The nearest composed-tree ancestor element, crossing shadow roots.
    pub fn composed_parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| {
            let mut current = t.composed_parent(id);
            while let Some(node) = current {
                if t.is_element(node) {
                    return Some(node);
                }
                current = t.composed_parent(node);
            }
            None
        })
    }

    /// All child nodes.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.with(|t| t.children(id).to_vec())
    }

    /// Child elements.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.with(|t| {
            t.children(id)
                .iter()
                .copied()
                .filter(|&c| t.is_element(c))
                .collect()
        })
    }

    /// The first child node.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| t.children(id).first().copied())
    }

    /// The last child node.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.with(|t| t.children(id).last().copied())
    }

    fn sibling(&self, id: NodeId, forward: bool, elements_only: bool) -> Option<NodeId> {
        self.with(|t| {
            let parent = t.parent(id)?;
            let siblings = t.children(parent);
            let index = siblings.iter().position(|&c| c == id)?;
            let candidates: Box<dyn Iterator<Item = &NodeId>> = if forward {
                Box::new(siblings[index + 1..].iter())
            } else {
                Box::new(siblings[..index].iter().rev())
            };
            candidates
                .copied()
                .find(|&c| !elements_only || t.is_element(c))
        })
    }

    /// The following sibling node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, true, false)
    }

    /// The preceding sibling node.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, false, false)
    }

    /// The following sibling element.
    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, true, true)
    }

    /// The preceding sibling element.
    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, false, true)
    }

    /// Appends `child` (or a fragment's children) to `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.with_mut(|t| t.insert(parent, child, None))
    }

    /// Inserts `child` as the first child of `parent`.
    pub fn prepend_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.with_mut(|t| t.insert(parent, child, Some(0)))
    }

    /// Inserts `child` before `reference`, or appends when `reference` is
    /// `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.with_mut(|t| {
            let index = match reference {
                Some(reference) => Some(
                    t.children(parent)
                        .iter()
                        .position(|&c| c == reference)
                        .ok_or_else(|| DomError::NotAChild {
                            reference: reference.to_string(),
                            parent: parent.to_string(),
                        })?,
                ),
                None => None,
            };
            t.insert(parent, child, index)
        })
    }

    /// Inserts `child` right after `reference` under the same parent.
    pub fn insert_after(&self, reference: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| DomError::UnknownNode(reference.to_string()))?;
        let next = self.next_sibling(reference);
        self.insert_before(parent, child, next)
    }

    /// Detaches a node from its parent. Its subtree stays intact.
    pub fn remove(&self, id: NodeId) {
        self.with_mut(|t| t.detach(id));
    }

    /// Detaches every child of `id`.
    pub fn clear_children(&self, id: NodeId) {
        self.with_mut(|t| {
            for child in t.children(id).to_vec() {
                t.detach(child);
            }
        });
    }

    /// Whether `ancestor` is `node` or a light-tree ancestor of it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.with(|t| t.contains(ancestor, node))
    }

    /// Whether `ancestor` is `node` or a composed-tree ancestor of it.
    pub fn composed_contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.with(|t| t.composed_contains(ancestor, node))
    }

    /// The root of the node's tree: the document, a shadow root, a fragment
    /// or a detached subtree root.
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        self.with(|t| t.tree_root(id))
    }

    /// Whether the node is in the document, possibly through shadow roots.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.with(|t| t.composed_contains(Self::ROOT, id))
    }

    /// Preorder light-tree descendants, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        self.with(|t| t.descendants(root))
    }

    /// Preorder light-tree descendant elements, excluding `root`.
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        self.with(|t| {
            t.descendants(root)
                .into_iter()
                .filter(|&id| t.is_element(id))
                .collect()
        })
    }

    /// Light-tree ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.with(|t| {
            let mut out = Vec::new();
            let mut current = t.parent(id);
            while let Some(node) = current {
                out.push(node);
                current = t.parent(node);
            }
            out
        })
    }

    /// Orders two nodes by composed-tree position.
    pub fn compare_position(&self, a: NodeId, b: NodeId) -> Ordering {
        self.with(|t| t.compare_position(a, b))
    }

    /// Sorts nodes by composed-tree position and removes duplicates.
    pub fn sort_unique(&self, nodes: &mut Vec<NodeId>) {
        self.with(|t| {
            nodes.sort_by(|&a, &b| t.compare_position(a, b));
            nodes.dedup();
        });
    }

    // === Attributes ===

    /// Reads an attribute.
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.with(|t| t.element(id).and_then(|e| e.attrs.get(name.as_str()).cloned()))
    }

    /// Whether an attribute is present.
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    /// Sets an attribute. Returns `false` for non-elements.
    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> bool {
        let name = SmolStr::new(name.to_ascii_lowercase());
        self.with_mut(|t| match t.element_mut(id) {
            Some(element) => {
                element.attrs.insert(name, value.to_string());
                true
            }
            None => false,
        })
    }

    /// Removes an attribute, returning its old value.
    pub fn remove_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.with_mut(|t| {
            t.element_mut(id)
                .and_then(|e| e.attrs.shift_remove(name.as_str()))
        })
    }

    /// Every attribute in source order.
    pub fn attributes(&self, id: NodeId) -> Vec<(SmolStr, String)> {
        self.with(|t| {
            t.element(id)
                .map(|e| {
                    e.attrs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    // === Classes ===

    /// The element's classes.
    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.get_attribute(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whether the element has `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_list(id).iter().any(|c| c == class)
    }

    /// Adds a class if absent.
    pub fn add_class(&self, id: NodeId, class: &str) {
        let mut classes = self.class_list(id);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(id, "class", &classes.join(" "));
        }
    }

    /// Removes a class.
    pub fn remove_class(&self, id: NodeId, class: &str) {
        let mut classes = self.class_list(id);
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() != before {
            self.set_attribute(id, "class", &classes.join(" "));
        }
    }

    /// Toggles a class, or forces it on/off. Returns whether it is now set.
    pub fn toggle_class(&self, id: NodeId, class: &str, force: Option<bool>) -> bool {
        let on = force.unwrap_or_else(|| !self.has_class(id, class));
        if on {
            self.add_class(id, class);
        } else {
            self.remove_class(id, class);
        }
        on
    }

    // === Text ===

    /// Concatenated text of the light-tree subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        self.with(|t| t.text_content(id))
    }

    /// Replaces the children of `id` with a single text node.
    pub fn set_text_content(&self, id: NodeId, text: &str) {
        if matches!(
            self.node_type(id),
            Some(NodeType::Text) | Some(NodeType::Comment)
        ) {
            self.set_node_text(id, text);
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            let _ = self.append_child(id, node);
        }
    }

    // === Properties ===

    /// Reads a DOM property.
    pub fn prop(&self, id: NodeId, name: &str) -> Option<serde_json::Value> {
        self.with(|t| t.element(id).and_then(|e| e.props.get(name).cloned()))
    }

    /// Writes a DOM property.
    pub fn set_prop(&self, id: NodeId, name: &str, value: serde_json::Value) {
        self.with_mut(|t| {
            if let Some(e) = t.element_mut(id) {
                e.props.insert(SmolStr::new(name), value);
            }
        });
    }

    /// Removes a DOM property.
    pub fn remove_prop(&self, id: NodeId, name: &str) -> Option<serde_json::Value> {
        self.with_mut(|t| t.element_mut(id).and_then(|e| e.props.remove(name)))
    }

    /// The form value: the `value` property, else the `value` attribute, else
    /// the text of a `<textarea>`.
    pub fn value(&self, id: NodeId) -> Option<String> {
        if let Some(value) = self.prop(id, "value") {
            return Some(match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
        }
        if let Some(value) = self.get_attribute(id, "value") {
            return Some(value);
        }
        match self.tag_name(id).as_deref() {
            Some("textarea") => Some(self.text_content(id)),
            Some("select") => self
                .descendant_elements(id)
                .into_iter()
                .find(|&o| self.has_attribute(o, "selected"))
                .map(|o| {
                    self.get_attribute(o, "value")
                        .unwrap_or_else(|| self.text_content(o))
                }),
            Some("input") => Some(String::new()),
            _ => None,
        }
    }

    /// Sets the `value` property.
    pub fn set_value(&self, id: NodeId, value: &str) {
        self.set_prop(id, "value", serde_json::Value::String(value.to_string()));
    }

    // === Shadow DOM ===

    /// Attaches a shadow root to an element.
    pub fn attach_shadow(&self, host: NodeId, mode: ShadowRootMode) -> Result<NodeId, DomError> {
        self.with_mut(|t| {
            match t.element(host) {
                Some(e) if e.shadow_root.is_none() => {}
                Some(_) => return Err(DomError::ShadowRootUnsupported(host.to_string())),
                None => return Err(DomError::NotAnElement(host.to_string())),
            }
            let root = t.push(NodeKind::ShadowRoot { host, mode });
            if let Some(e) = t.element_mut(host) {
                e.shadow_root = Some(root);
            }
            Ok(root)
        })
    }

    /// The element's open shadow root.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.with(|t| {
            let root = t.element(host)?.shadow_root?;
            match t.node(root).map(|n| &n.kind) {
                Some(NodeKind::ShadowRoot {
                    mode: ShadowRootMode::Open,
                    ..
                }) => Some(root),
                _ => None,
            }
        })
    }

    /// The element's shadow root regardless of mode.
    pub fn shadow_root_any(&self, host: NodeId) -> Option<NodeId> {
        self.with(|t| t.element(host)?.shadow_root)
    }

    /// The host of a shadow root.
    pub fn host(&self, shadow_root: NodeId) -> Option<NodeId> {
        self.with(|t| match t.node(shadow_root).map(|n| &n.kind) {
            Some(NodeKind::ShadowRoot { host, .. }) => Some(*host),
            _ => None,
        })
    }

    /// The mode of a shadow root.
    pub fn shadow_mode(&self, shadow_root: NodeId) -> Option<ShadowRootMode> {
        self.with(|t| match t.node(shadow_root).map(|n| &n.kind) {
            Some(NodeKind::ShadowRoot { mode, .. }) => Some(*mode),
            _ => None,
        })
    }

    /// The shadow root containing `id`, if any.
    pub fn containing_shadow_root(&self, id: NodeId) -> Option<NodeId> {
        let root = self.tree_root(id);
        (self.node_type(root) == Some(NodeType::ShadowRoot)).then_some(root)
    }

    // === Layout ===

    /// Assigns an element's layout box.
    pub fn set_layout(&self, id: NodeId, layout: LayoutBox) {
        self.with_mut(|t| {
            if let Some(e) = t.element_mut(id) {
                e.layout = Some(layout);
            }
        });
    }

    /// The element's assigned layout box.
    pub fn layout(&self, id: NodeId) -> Option<LayoutBox> {
        self.with(|t| t.element(id).and_then(|e| e.layout))
    }

    /// Scroll offsets of an element, or of the viewport for the document node.
    pub fn scroll(&self, id: NodeId) -> (f64, f64) {
        self.with(|t| match t.node(id).map(|n| &n.kind) {
            Some(NodeKind::Document { scroll }) => *scroll,
            Some(NodeKind::Element(e)) => e.scroll,
            _ => (0.0, 0.0),
        })
    }

    /// Sets scroll offsets of an element or of the viewport.
    pub fn set_scroll(&self, id: NodeId, x: f64, y: f64) {
        self.with_mut(|t| match t.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Document { scroll }) => *scroll = (x, y),
            Some(NodeKind::Element(e)) => e.scroll = (x, y),
            _ => {}
        });
    }
}

fn clone_into(t: &mut DomTree, id: NodeId, deep: bool) -> NodeId {
    let kind = match t.node(id).map(|n| &n.kind) {
        Some(NodeKind::Element(e)) => {
            let mut copy = ElementData::new(&e.tag);
            copy.attrs = e.attrs.clone();
            NodeKind::Element(copy)
        }
        Some(NodeKind::Text(s)) => NodeKind::Text(s.clone()),
        Some(NodeKind::Comment(s)) => NodeKind::Comment(s.clone()),
        _ => NodeKind::Fragment,
    };
    let copy = t.push(kind);
    if deep {
        for child in t.children(id).to_vec() {
            let child_copy = clone_into(t, child, true);
            t.nodes[child_copy.index()].parent = Some(copy);
            t.nodes[copy.index()].children.push(child_copy);
        }
    }
    copy
}
