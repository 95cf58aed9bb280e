//! The query collection, construction and traversal.

use crate::error::QueryError;
use dom_tree::{Document, NodeId, Selector};
use rustc_hash::FxHashSet;
use std::ops::Index;

/// Where and how a selector is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Search root. Defaults to the document node.
    pub root: Option<NodeId>,
    /// Also match inside every open shadow root under the search root.
    pub pierce_shadow: bool,
}

impl QueryOptions {
    /// Options for a shadow-piercing search.
    pub fn deep() -> Self {
        Self {
            root: None,
            pierce_shadow: true,
        }
    }

    /// Sets the search root.
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }
}

/// An ordered collection of nodes with chainable operations.
///
/// Getters read the first node; setters apply to every node and return the
/// collection for chaining. Traversals return a new collection that remembers
/// this one, reachable again through [`Query::end`].
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) doc: Document,
    pub(crate) nodes: Vec<NodeId>,
    selector: Option<String>,
    pub(crate) options: QueryOptions,
    prev: Option<Box<Query>>,
}

/// Matches `selector` under `root`: light matches at each level first, then
/// every open shadow root in document order, recursively.
pub(crate) fn deep_select(doc: &Document, root: NodeId, selector: &Selector) -> Vec<NodeId> {
    let mut out = doc.select_all(root, selector);
    let mut hosts = Vec::new();
    if doc.is_element(root) {
        hosts.push(root);
    }
    hosts.extend(doc.descendant_elements(root));
    for host in hosts {
        if let Some(shadow) = doc.shadow_root(host) {
            out.extend(deep_select(doc, shadow, selector));
        }
    }
    out
}

/// Keeps the first occurrence of each node.
pub(crate) fn dedupe(nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = FxHashSet::default();
    nodes.into_iter().filter(|n| seen.insert(*n)).collect()
}

impl Query {
    /// Matches `selector` in the light tree of the whole document.
    pub fn select(doc: &Document, selector: &str) -> Result<Self, QueryError> {
        Self::select_with(doc, selector, QueryOptions::default())
    }

    /// Matches `selector` in the document and every open shadow root.
    pub fn select_deep(doc: &Document, selector: &str) -> Result<Self, QueryError> {
        Self::select_with(doc, selector, QueryOptions::deep())
    }

    /// Matches `selector` with explicit options.
    pub fn select_with(
        doc: &Document,
        selector: &str,
        options: QueryOptions,
    ) -> Result<Self, QueryError> {
        let parsed = Selector::parse(selector)?;
        let root = options.root.unwrap_or(doc.root());
        let nodes = if options.pierce_shadow {
            deep_select(doc, root, &parsed)
        } else {
            doc.select_all(root, &parsed)
        };
        Ok(Self {
            doc: doc.clone(),
            nodes,
            selector: Some(selector.to_string()),
            options,
            prev: None,
        })
    }

    /// Wraps existing nodes without searching.
    pub fn from_nodes(doc: &Document, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            doc: doc.clone(),
            nodes: dedupe(nodes.into_iter().collect()),
            selector: None,
            options: QueryOptions::default(),
            prev: None,
        }
    }

    /// Wraps one node.
    pub fn from_node(doc: &Document, node: NodeId) -> Self {
        Self::from_nodes(doc, [node])
    }

    /// Creates detached elements from markup.
    pub fn from_html(doc: &Document, html: &str) -> Self {
        let fragment = doc.parse_fragment(html);
        let nodes = doc.element_children(fragment);
        Self::from_nodes(doc, nodes)
    }

    /// Builds a derived collection that remembers `self`.
    pub(crate) fn derive(&self, nodes: Vec<NodeId>, selector: Option<&str>) -> Self {
        Self {
            doc: self.doc.clone(),
            nodes,
            selector: selector.map(str::to_string),
            options: self.options,
            prev: Some(Box::new(self.clone())),
        }
    }

    /// The document the nodes belong to.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The selector that produced this collection, if any.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// The resolved options.
    pub fn options(&self) -> QueryOptions {
        self.options
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at `index`.
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    /// The nodes in order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Iterates the nodes.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.nodes.iter()
    }

    /// Calls `f` with each index and node.
    pub fn each(&self, mut f: impl FnMut(usize, NodeId)) -> &Self {
        for (i, &node) in self.nodes.iter().enumerate() {
            f(i, node);
        }
        self
    }

    fn parse(&self, selector: &str) -> Result<Selector, QueryError> {
        Ok(Selector::parse(selector)?)
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        if self.options.pierce_shadow {
            self.doc.composed_parent_element(node)
        } else {
            self.doc.parent_element(node)
        }
    }

    // === Traversal ===

    /// Descendants of every node that match `selector`, deduplicated.
    pub fn find(&self, selector: &str) -> Result<Self, QueryError> {
        let parsed = self.parse(selector)?;
        let mut found = Vec::new();
        for &node in &self.nodes {
            if self.options.pierce_shadow {
                found.extend(deep_select(&self.doc, node, &parsed));
            } else {
                found.extend(self.doc.select_all(node, &parsed));
            }
        }
        Ok(self.derive(dedupe(found), Some(selector)))
    }

    /// The parent element of every node.
    pub fn parent(&self) -> Self {
        let parents = self.nodes.iter().filter_map(|&n| self.parent_of(n)).collect();
        self.derive(dedupe(parents), None)
    }

    /// Child elements, optionally filtered.
    pub fn children(&self, selector: Option<&str>) -> Result<Self, QueryError> {
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .flat_map(|&n| self.doc.element_children(n))
            .collect();
        self.derive(dedupe(children), None).filtered(selector)
    }

    /// Sibling elements of every node, excluding the nodes themselves.
    pub fn siblings(&self, selector: Option<&str>) -> Result<Self, QueryError> {
        let mut out = Vec::new();
        for &node in &self.nodes {
            if let Some(parent) = self.doc.parent(node) {
                out.extend(
                    self.doc
                        .element_children(parent)
                        .into_iter()
                        .filter(|&s| s != node),
                );
            }
        }
        self.derive(dedupe(out), None).filtered(selector)
    }

    /// The next sibling element of every node.
    pub fn next(&self, selector: Option<&str>) -> Result<Self, QueryError> {
        let next = self
            .nodes
            .iter()
            .filter_map(|&n| self.doc.next_element_sibling(n))
            .collect();
        self.derive(dedupe(next), None).filtered(selector)
    }

    /// The previous sibling element of every node.
    pub fn prev(&self, selector: Option<&str>) -> Result<Self, QueryError> {
        let prev = self
            .nodes
            .iter()
            .filter_map(|&n| self.doc.prev_element_sibling(n))
            .collect();
        self.derive(dedupe(prev), None).filtered(selector)
    }

    /// Narrows a freshly derived collection in place, keeping its `prev`.
    fn filtered(mut self, selector: Option<&str>) -> Result<Self, QueryError> {
        if let Some(selector) = selector {
            let parsed = self.parse(selector)?;
            self.nodes.retain(|&n| self.doc.matches(n, &parsed));
            self.selector = Some(selector.to_string());
        }
        Ok(self)
    }

    /// Matching ancestors (self included) of one node, nearest first.
    fn matching_ancestors(&self, node: NodeId, selector: &Selector, all: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            if self.doc.matches(id, selector) {
                out.push(id);
                if !all {
                    break;
                }
            }
            current = self.parent_of(id);
        }
        out
    }

    /// The nearest match, self included, for every node.
    pub fn closest(&self, selector: &str) -> Result<Self, QueryError> {
        let parsed = self.parse(selector)?;
        let found = self
            .nodes
            .iter()
            .flat_map(|&n| self.matching_ancestors(n, &parsed, false))
            .collect();
        Ok(self.derive(dedupe(found), Some(selector)))
    }

    /// Every matching ancestor, self included, of every node, deduplicated and
    /// in document order.
    pub fn closest_all(&self, selector: &str) -> Result<Self, QueryError> {
        let parsed = self.parse(selector)?;
        let mut found: Vec<NodeId> = self
            .nodes
            .iter()
            .flat_map(|&n| self.matching_ancestors(n, &parsed, true))
            .collect();
        self.doc.sort_unique(&mut found);
        Ok(self.derive(found, Some(selector)))
    }

    /// Nodes that match `selector`.
    pub fn filter(&self, selector: &str) -> Result<Self, QueryError> {
        let parsed = self.parse(selector)?;
        let kept = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| self.doc.matches(n, &parsed))
            .collect();
        Ok(self.derive(kept, Some(selector)))
    }

    /// Nodes for which `predicate` holds.
    pub fn filter_by(&self, mut predicate: impl FnMut(&Document, NodeId) -> bool) -> Self {
        let kept = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| predicate(&self.doc, n))
            .collect();
        self.derive(kept, None)
    }

    /// Nodes that do not match `selector`.
    pub fn not(&self, selector: &str) -> Result<Self, QueryError> {
        let parsed = self.parse(selector)?;
        let kept = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| !self.doc.matches(n, &parsed))
            .collect();
        Ok(self.derive(kept, None))
    }

    /// Whether any node matches `selector`.
    pub fn is(&self, selector: &str) -> Result<bool, QueryError> {
        let parsed = self.parse(selector)?;
        Ok(self.nodes.iter().any(|&n| self.doc.matches(n, &parsed)))
    }

    /// The union with the nodes matched by `selector`, in document order.
    pub fn add(&self, selector: &str) -> Result<Self, QueryError> {
        let options = QueryOptions {
            root: None,
            ..self.options
        };
        let other = Self::select_with(&self.doc, selector, options)?;
        Ok(self.add_query(&other))
    }

    /// The union with another collection, in document order.
    pub fn add_query(&self, other: &Query) -> Self {
        let mut nodes: Vec<NodeId> = self.nodes.iter().chain(&other.nodes).copied().collect();
        self.doc.sort_unique(&mut nodes);
        self.derive(nodes, None)
    }

    /// The collection this one was derived from, or an empty one.
    pub fn end(&self) -> Self {
        match &self.prev {
            Some(prev) => (**prev).clone(),
            None => Self::from_nodes(&self.doc, []),
        }
    }

    /// The node at `index` as a collection. Negative indexes count from the
    /// end.
    pub fn eq(&self, index: isize) -> Self {
        let resolved = if index < 0 {
            self.nodes.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize)
        };
        let node = resolved.and_then(|i| self.nodes.get(i)).copied();
        self.derive(node.into_iter().collect(), None)
    }

    /// The first node as a collection.
    pub fn first(&self) -> Self {
        self.eq(0)
    }

    /// The last node as a collection.
    pub fn last(&self) -> Self {
        self.eq(-1)
    }
}

impl Index<usize> for Query {
    type Output = NodeId;

    fn index(&self, index: usize) -> &NodeId {
        &self.nodes[index]
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_tree::ShadowRootMode;
    use pretty_assertions::assert_eq;

    fn nested_shadow_doc() -> (Document, Vec<NodeId>) {
        // body
        //   b#l1
        //   x-outer (shadow: b#s1, x-inner (shadow: b#s2))
        //   b#l2
        let doc = Document::from_html("<b id=\"l1\"></b><x-outer></x-outer><b id=\"l2\"></b>");
        let outer = doc.query_selector(doc.root(), "x-outer").unwrap().unwrap();
        let outer_root = doc.attach_shadow(outer, ShadowRootMode::Open).unwrap();
        doc.set_inner_html(outer_root, "<b id=\"s1\"></b><x-inner></x-inner>");
        let inner = doc.query_selector(outer_root, "x-inner").unwrap().unwrap();
        let inner_root = doc.attach_shadow(inner, ShadowRootMode::Open).unwrap();
        doc.set_inner_html(inner_root, "<b id=\"s2\"></b>");
        let ids = ["l1", "l2", "s1", "s2"]
            .iter()
            .map(|id| {
                let sel = format!("#{id}");
                Query::select_deep(&doc, &sel).unwrap()[0]
            })
            .collect();
        (doc, ids)
    }

    #[test]
    fn test_light_query_ignores_shadow() {
        let (doc, ids) = nested_shadow_doc();
        let q = Query::select(&doc, "b").unwrap();
        assert_eq!(q.nodes(), &ids[..2]);
    }

    #[test]
    fn test_deep_query_order() {
        let (doc, ids) = nested_shadow_doc();
        let q = Query::select_deep(&doc, "b").unwrap();
        assert_eq!(q.nodes(), ids.as_slice());
    }

    #[test]
    fn test_closed_shadow_not_pierced() {
        let doc = Document::from_html("<div></div>");
        let host = doc.element_children(doc.body())[0];
        let shadow = doc.attach_shadow(host, ShadowRootMode::Closed).unwrap();
        doc.set_inner_html(shadow, "<b></b>");
        assert!(Query::select_deep(&doc, "b").unwrap().is_empty());
    }

    #[test]
    fn test_selector_error_propagates() {
        let doc = Document::new();
        assert!(matches!(
            Query::select(&doc, "div >"),
            Err(QueryError::Selector(_))
        ));
    }

    #[test]
    fn test_traversal_chain_and_end() {
        let doc = Document::from_html(
            "<ul class=\"a\"><li>1</li><li class=\"x\">2</li><li>3</li></ul><ul class=\"b\"><li>4</li></ul>",
        );
        let lis = Query::select(&doc, "li").unwrap();
        assert_eq!(lis.len(), 4);
        let parents = lis.parent();
        assert_eq!(parents.len(), 2);
        assert_eq!(parents.end().len(), 4);

        let x = lis.filter(".x").unwrap();
        assert_eq!(x.siblings(None).unwrap().len(), 2);
        assert_eq!(doc.text_content(x.next(None).unwrap()[0]), "3");
        assert_eq!(doc.text_content(x.prev(None).unwrap()[0]), "1");
        assert_eq!(lis.not(".x").unwrap().len(), 3);
        assert!(lis.is(".x").unwrap());
        assert_eq!(doc.text_content(lis.last()[0]), "4");
        assert_eq!(doc.text_content(lis.eq(-2)[0]), "3");
        assert!(lis.eq(9).is_empty());
    }

    #[test]
    fn test_closest_all_dedupes_in_document_order() {
        let doc = Document::from_html(
            "<div class=\"p\" id=\"outer\"><div class=\"p\" id=\"inner\"><i></i><i></i></div></div>",
        );
        let is = Query::select(&doc, "i").unwrap();
        let all = is.closest_all(".p").unwrap();
        let ids: Vec<_> = all
            .iter()
            .map(|&n| doc.get_attribute(n, "id").unwrap())
            .collect();
        assert_eq!(ids, vec!["outer", "inner"]);
        assert_eq!(is.closest(".p").unwrap().len(), 1);
    }

    #[test]
    fn test_add_is_ordered_union() {
        let doc = Document::from_html("<a></a><b></b><i></i>");
        let q = Query::select(&doc, "i").unwrap().add("a, i").unwrap();
        let tags: Vec<_> = q.iter().map(|&n| doc.tag_name(n).unwrap()).collect();
        assert_eq!(tags, vec!["a", "i"]);
    }

    #[test]
    fn test_scoped_root() {
        let doc = Document::from_html("<div id=\"a\"><p></p></div><p></p>");
        let root = doc.query_selector(doc.root(), "#a").unwrap().unwrap();
        let q = Query::select_with(&doc, "p", QueryOptions::default().with_root(root)).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.find("p").unwrap().len(), 0);
    }

    #[test]
    fn test_from_html_detached() {
        let doc = Document::new();
        let q = Query::from_html(&doc, "<li>a</li><li>b</li>");
        assert_eq!(q.len(), 2);
        assert!(!doc.is_connected(q[0]));
    }
}
