//! Event maps: parsing bindings and wiring them to the DOM.
//!
//! A binding reads `[global|deep|bind] type[, type…] [selector]`:
//!
//! - scoped (the default) delegates from the template's container and only
//!   fires for targets inside the template's own nodes
//! - `deep` does the same but looks through shadow roots along the composed
//!   path
//! - `global` listens on the document
//! - `bind` attaches direct listeners to matching elements once rendered

use crate::definition::EventHandler;
use crate::error::RuntimeError;
use crate::template::Template;
use dom_query::delegated_target;
use dom_tree::{Document, Event, ListenerOptions, NodeId, NodeType, Selector};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use template_compiler::StringScanner;

/// Where an event binding listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Scoped,
    Deep,
    Global,
    Bind,
}

/// A parsed event map key.
#[derive(Debug, Clone)]
pub struct EventBinding {
    pub scope: EventScope,
    pub types: Vec<SmolStr>,
    pub selector: Option<Selector>,
    selector_source: Option<String>,
}

impl PartialEq for EventBinding {
    fn eq(&self, other: &Self) -> bool {
        self.scope == other.scope
            && self.types == other.types
            && self.selector_source == other.selector_source
    }
}

fn is_type_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

impl EventBinding {
    /// Parses an event map key.
    pub fn parse(spec: &str) -> Result<Self, RuntimeError> {
        let invalid = |message: &str| RuntimeError::InvalidEventBinding {
            spec: spec.to_string(),
            message: message.to_string(),
        };
        let mut scanner = StringScanner::new(spec.trim());
        let mut scope = EventScope::Scoped;
        for (keyword, value) in [
            ("global", EventScope::Global),
            ("deep", EventScope::Deep),
            ("bind", EventScope::Bind),
        ] {
            let rest = scanner.rest();
            if rest.starts_with(keyword)
                && rest[keyword.len()..].starts_with(char::is_whitespace)
            {
                scanner.advance(keyword.len());
                scanner.skip_whitespace();
                scope = value;
                break;
            }
        }

        let mut types = Vec::new();
        loop {
            let event_type = scanner.consume_while(is_type_char);
            if event_type.is_empty() {
                return Err(invalid("expected an event type"));
            }
            types.push(SmolStr::new(event_type));
            let before_comma = scanner.pos();
            scanner.skip_whitespace();
            if scanner.consume(",") {
                scanner.skip_whitespace();
                continue;
            }
            scanner.seek(before_comma);
            break;
        }

        let rest = scanner.rest().trim();
        if !rest.is_empty() && !scanner.rest().starts_with(char::is_whitespace) {
            return Err(invalid("expected whitespace before the selector"));
        }
        let selector = if rest.is_empty() {
            None
        } else {
            Some(Selector::parse(rest)?)
        };
        Ok(Self {
            scope,
            types,
            selector,
            selector_source: (!rest.is_empty()).then(|| rest.to_string()),
        })
    }

    /// The selector as written.
    pub fn selector_source(&self) -> Option<&str> {
        self.selector_source.as_deref()
    }
}

/// What an event handler receives.
pub struct EventArgs<'a> {
    pub template: &'a Template,
    pub document: &'a Document,
    pub event: &'a mut Event,
    /// The matched element, or the bound node for bindings without a
    /// selector.
    pub target: NodeId,
    /// The target's `data-*` attributes, camelCased and type-converted.
    pub data: Map<String, Value>,
}

fn listener_options(template: &Template, event_type: &str) -> ListenerOptions {
    ListenerOptions {
        // focus and blur do not bubble.
        capture: matches!(event_type, "focus" | "blur"),
        once: false,
        owner: Some(template.id().get()),
    }
}

fn invoke(
    template: &Template,
    doc: &Document,
    event: &mut Event,
    target: NodeId,
    handler: &EventHandler,
) {
    let data = doc.dataset(target);
    let mut args = EventArgs {
        template,
        document: doc,
        event,
        target,
        data,
    };
    handler(&mut args);
}

/// Registers every binding of the template's event map.
pub(crate) fn bind_events(template: &Template) {
    let (Some(doc), Some(container)) = (template.document(), template.container()) else {
        return;
    };
    let definition = template.definition().clone();
    for (binding, handler) in &definition.events {
        match binding.scope {
            EventScope::Scoped | EventScope::Deep => {
                delegate(template, &doc, container, binding, handler)
            }
            EventScope::Global => delegate(template, &doc, doc.root(), binding, handler),
            EventScope::Bind => bind_direct(template, &doc, binding, handler),
        }
    }
}

fn delegate(
    template: &Template,
    doc: &Document,
    node: NodeId,
    binding: &EventBinding,
    handler: &EventHandler,
) {
    let deep = binding.scope != EventScope::Scoped;
    let scoped = matches!(binding.scope, EventScope::Scoped | EventScope::Deep);
    for event_type in &binding.types {
        let weak = template.downgrade();
        let selector = binding.selector.clone();
        let handler = handler.clone();
        doc.add_listener(
            node,
            event_type,
            listener_options(template, event_type),
            move |doc, event| {
                let Some(template) = weak.upgrade() else {
                    return;
                };
                let matched = match &selector {
                    Some(selector) => delegated_target(doc, event, selector, deep),
                    None if deep => event.original_target(),
                    None => event.target(),
                };
                let Some(matched) = matched else {
                    return;
                };
                if scoped && !template.contains_node(matched) {
                    return;
                }
                invoke(&template, doc, event, matched, &handler);
            },
        );
    }
}

fn bind_direct(template: &Template, doc: &Document, binding: &EventBinding, handler: &EventHandler) {
    let targets: Vec<NodeId> = match &binding.selector {
        Some(selector) => template
            .nodes()
            .into_iter()
            .flat_map(|node| {
                let mut found: Vec<NodeId> = Vec::new();
                if doc.matches(node, selector) {
                    found.push(node);
                }
                found.extend(doc.select_all(node, selector));
                found
            })
            .collect(),
        None => template
            .nodes()
            .into_iter()
            .filter(|&node| doc.node_type(node) == Some(NodeType::Element))
            .collect(),
    };
    for target in targets {
        for event_type in &binding.types {
            let weak = template.downgrade();
            let handler = handler.clone();
            doc.add_listener(
                target,
                event_type,
                listener_options(template, event_type),
                move |doc, event| {
                    if let Some(template) = weak.upgrade() {
                        invoke(&template, doc, event, target, &handler);
                    }
                },
            );
        }
    }
    tracing::trace!(template = %template.name(), types = ?binding.types, "bound direct listeners");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_scopes_and_types() {
        let binding = EventBinding::parse("click .save").unwrap();
        assert_eq!(binding.scope, EventScope::Scoped);
        assert_eq!(binding.types, vec!["click"]);
        assert_eq!(binding.selector_source(), Some(".save"));

        let binding = EventBinding::parse("deep input , change  input[type=text]").unwrap();
        assert_eq!(binding.scope, EventScope::Deep);
        assert_eq!(binding.types, vec!["input", "change"]);
        assert_eq!(binding.selector_source(), Some("input[type=text]"));

        let binding = EventBinding::parse("global resize").unwrap();
        assert_eq!(binding.scope, EventScope::Global);
        assert!(binding.selector.is_none());

        // A type named like a scope keyword is still a type.
        let binding = EventBinding::parse("bind").unwrap();
        assert_eq!(binding.scope, EventScope::Scoped);
        assert_eq!(binding.types, vec!["bind"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            EventBinding::parse(""),
            Err(RuntimeError::InvalidEventBinding { .. })
        ));
        assert!(matches!(
            EventBinding::parse("click, .x"),
            Err(RuntimeError::InvalidEventBinding { .. })
        ));
        assert!(matches!(
            EventBinding::parse("click li >"),
            Err(RuntimeError::Selector(_))
        ));
    }
}
