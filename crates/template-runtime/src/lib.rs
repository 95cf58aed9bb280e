//! Reactive template runtime.
//!
//! Ties compiled templates to reactive state and a [`dom_tree::Document`]:
//! - [`Runtime`] bundles the reactor, instance registry, helpers and AST
//!   cache; nothing is global
//! - [`TemplateBuilder`] produces shared [`TemplateDefinition`]s
//! - [`Template`] instances render to strings or attach to a document, where
//!   every dynamic position becomes a part with its own reaction
//! - event maps, key maps, partials, slots and a parent/child hierarchy
//!
//! # Example
//!
//! ```
//! use dom_tree::Document;
//! use serde_json::json;
//! use template_runtime::{Runtime, TemplateBuilder};
//!
//! let runtime = Runtime::new();
//! let panel = runtime
//!     .define(
//!         TemplateBuilder::new("panel")
//!             .source("{#if isOpen}<div class='content'>Open</div>{/if}")
//!             .state(json!({"isOpen": false})),
//!     )
//!     .unwrap();
//!
//! let doc = Document::new();
//! let template = runtime.create(&panel, None);
//! template.attach(&doc, doc.body(), None).unwrap();
//! assert_eq!(doc.inner_html(doc.body()), "");
//!
//! template.state().set("isOpen", true);
//! runtime.flush();
//! assert_eq!(doc.inner_html(doc.body()), "<div class=\"content\">Open</div>");
//! ```

mod definition;
mod error;
mod eval;
mod events;
mod helpers;
mod keys;
mod parts;
mod program;
mod registry;
mod render;
mod runtime;
mod state;
mod template;
mod value;

pub use definition::{EventHandler, Hook, KeyHandler, Method, TemplateBuilder, TemplateDefinition};
pub use error::{EvalError, HelperError, RuntimeError};
pub use events::{EventArgs, EventBinding, EventScope};
pub use helpers::{Helper, HelperRegistry};
pub use keys::{KeyArgs, KeyBinding, KeyChord};
pub use registry::TemplateRegistry;
pub use runtime::{Runtime, RuntimeOptions};
pub use state::State;
pub use template::{Lifecycle, Template, TemplateId, WeakTemplate};
pub use value::{escape_html, stringify, truthy};
