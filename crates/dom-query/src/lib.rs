//! Chainable queries over a [`dom_tree::Document`].
//!
//! A [`Query`] is an ordered, duplicate-free collection of nodes. Light
//! queries behave like `querySelectorAll` and stop at shadow roots; deep
//! queries also search every open shadow root below the search root, and
//! their traversals step through shadow boundaries.
//!
//! # Example
//!
//! ```
//! use dom_query::Query;
//! use dom_tree::{Document, ShadowRootMode};
//!
//! let doc = Document::from_html("<div id=\"host\"></div><p class=\"note\">light</p>");
//! let host = doc.query_selector(doc.root(), "#host").unwrap().unwrap();
//! let shadow = doc.attach_shadow(host, ShadowRootMode::Open).unwrap();
//! doc.set_inner_html(shadow, "<p class=\"note\">shadow</p>");
//!
//! assert_eq!(Query::select(&doc, ".note").unwrap().len(), 1);
//! let deep = Query::select_deep(&doc, ".note").unwrap();
//! assert_eq!(deep.len(), 2);
//! assert_eq!(deep.last().text().as_deref(), Some("shadow"));
//! ```

mod content;
mod display;
mod error;
mod events;
mod geometry;
mod mutation;
mod query;

pub use display::{
    element_visible, NaturalDisplayOptions, Visibility, VisibilityOptions,
};
pub use error::QueryError;
pub use events::{delegated_target, OnNextOptions};
pub use geometry::{
    clipping_parent, containing_parent, offset_parent, positioning_parent, Dimensions, Point,
    Position, PositionOptions, Size,
};
pub use mutation::Content;
pub use query::{Query, QueryOptions};
