//! In-memory DOM host.
//!
//! A single-threaded document model that templates render into and queries
//! traverse:
//! - an arena of nodes with elements, text, comments, fragments and open or
//!   closed shadow roots
//! - a tolerant HTML fragment parser and serializer
//! - CSS selector matching scoped to one tree at a time
//! - inline styles, `<style>` rules per tree scope and computed values
//! - host-supplied layout boxes
//! - capture/bubble event dispatch with composed paths and retargeting
//!
//! # Example
//!
//! ```
//! use dom_tree::Document;
//!
//! let doc = Document::from_html("<ul><li class='a'>x</li><li>y</li></ul>");
//! let items = doc.query_selector_all(doc.root(), "li.a").unwrap();
//! assert_eq!(doc.text_content(items[0]), "x");
//! assert_eq!(doc.inner_html(doc.body()), "<ul><li class=\"a\">x</li><li>y</li></ul>");
//! ```

mod dataset;
mod document;
mod error;
mod event;
mod layout;
mod node;
mod parse;
mod selector;
mod serialize;
mod style;

pub use dataset::{camel_case, convert_data_value, kebab_case};
pub use document::Document;
pub use error::{DomError, SelectorError};
pub use event::{Event, Listener, ListenerId, ListenerOptions, Modifiers};
pub use layout::{Edges, LayoutBox, Rect};
pub use node::{NodeId, NodeType, ShadowRootMode};
pub use parse::{decode_entities, is_void_element, VOID_ELEMENTS};
pub use selector::{Selector, Specificity};
pub use serialize::{escape_attribute, escape_text};
pub use style::{default_display, parse_declarations, parse_stylesheet, Declaration, StyleRule};
