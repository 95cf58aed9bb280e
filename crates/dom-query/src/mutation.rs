//! Inserting and removing nodes.

use crate::error::QueryError;
use crate::query::Query;
use dom_tree::{Document, NodeId};

/// Content to insert: markup parsed per target, or existing nodes.
#[derive(Debug, Clone)]
pub enum Content<'a> {
    /// Markup, parsed once for every target.
    Html(&'a str),
    /// Existing nodes. The first target receives the nodes themselves, later
    /// targets receive deep copies.
    Nodes(Vec<NodeId>),
}

impl<'a> From<&'a str> for Content<'a> {
    fn from(html: &'a str) -> Self {
        Content::Html(html)
    }
}

impl From<NodeId> for Content<'_> {
    fn from(node: NodeId) -> Self {
        Content::Nodes(vec![node])
    }
}

impl From<&Query> for Content<'_> {
    fn from(query: &Query) -> Self {
        Content::Nodes(query.nodes().to_vec())
    }
}

#[derive(Clone, Copy)]
enum Placement {
    Append,
    Prepend,
    Before,
    After,
}

impl Content<'_> {
    /// Materializes the content for the `index`-th target as a fragment.
    fn fragment_for(&self, doc: &Document, index: usize) -> Result<NodeId, QueryError> {
        match self {
            Content::Html(html) => Ok(doc.parse_fragment(html)),
            Content::Nodes(nodes) => {
                let fragment = doc.create_fragment();
                for &node in nodes {
                    let node = if index == 0 {
                        node
                    } else {
                        doc.clone_node(node, true)
                    };
                    doc.append_child(fragment, node)?;
                }
                Ok(fragment)
            }
        }
    }
}

impl Query {
    fn insert(&self, content: Content<'_>, placement: Placement) -> Result<&Self, QueryError> {
        for (index, &target) in self.nodes.iter().enumerate() {
            let fragment = content.fragment_for(&self.doc, index)?;
            match placement {
                Placement::Append => self.doc.append_child(target, fragment)?,
                Placement::Prepend => self.doc.prepend_child(target, fragment)?,
                Placement::Before => {
                    if let Some(parent) = self.doc.parent(target) {
                        self.doc.insert_before(parent, fragment, Some(target))?;
                    }
                }
                Placement::After => {
                    if self.doc.parent(target).is_some() {
                        self.doc.insert_after(target, fragment)?;
                    }
                }
            }
        }
        Ok(self)
    }

    /// Inserts content as the last children of every node.
    pub fn append<'a>(&self, content: impl Into<Content<'a>>) -> Result<&Self, QueryError> {
        self.insert(content.into(), Placement::Append)
    }

    /// Inserts content as the first children of every node.
    pub fn prepend<'a>(&self, content: impl Into<Content<'a>>) -> Result<&Self, QueryError> {
        self.insert(content.into(), Placement::Prepend)
    }

    /// Inserts content before every node.
    pub fn before<'a>(&self, content: impl Into<Content<'a>>) -> Result<&Self, QueryError> {
        self.insert(content.into(), Placement::Before)
    }

    /// Inserts content after every node.
    pub fn after<'a>(&self, content: impl Into<Content<'a>>) -> Result<&Self, QueryError> {
        self.insert(content.into(), Placement::After)
    }

    /// Detaches every node and drops its listeners.
    pub fn remove(&self) -> &Self {
        for &node in &self.nodes {
            self.doc.remove_listeners(node, None);
            self.doc.remove(node);
        }
        self
    }

    /// Removes every child of every node.
    pub fn empty(&self) -> &Self {
        for &node in &self.nodes {
            self.doc.clear_children(node);
        }
        self
    }
}
