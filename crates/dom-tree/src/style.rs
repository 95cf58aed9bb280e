//! Inline styles, scoped stylesheets and computed values.
//!
//! The cascade is deliberately small: `!important` declarations beat normal
//! ones, inline beats stylesheet rules, and rules compete by specificity and
//! then source order. Stylesheets are the `<style>` elements of the element's
//! own tree scope (the document or the enclosing shadow root). Inherited
//! properties and custom properties fall back to the composed parent.

use crate::document::{Document, DomTree};
use crate::layout::Rect;
use crate::node::NodeId;
use crate::selector::{Selector, Specificity};

/// One `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercase property name, or a custom property as written.
    pub property: String,
    /// The value without `!important`.
    pub value: String,
    /// Whether the declaration was marked `!important`.
    pub important: bool,
}

/// A parsed style rule.
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// The rule's selector.
    pub selector: Selector,
    /// The rule's declarations in source order.
    pub declarations: Vec<Declaration>,
}

const INHERITED: &[&str] = &[
    "color",
    "cursor",
    "direction",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "letter-spacing",
    "line-height",
    "text-align",
    "text-transform",
    "visibility",
    "white-space",
    "word-spacing",
];

fn is_inherited(property: &str) -> bool {
    property.starts_with("--") || INHERITED.contains(&property)
}

fn normalize_property(property: &str) -> String {
    let property = property.trim();
    if property.starts_with("--") {
        property.to_string()
    } else {
        property.to_ascii_lowercase()
    }
}

/// The user-agent `display` value for a tag.
pub fn default_display(tag: &str) -> &'static str {
    match tag.to_ascii_lowercase().as_str() {
        "address" | "article" | "aside" | "blockquote" | "body" | "dd" | "details" | "dialog"
        | "div" | "dl" | "dt" | "fieldset" | "figcaption" | "figure" | "footer" | "form" | "h1"
        | "h2" | "h3" | "h4" | "h5" | "h6" | "header" | "hgroup" | "hr" | "html" | "legend"
        | "main" | "menu" | "nav" | "ol" | "p" | "pre" | "search" | "section" | "summary"
        | "ul" => "block",
        "li" => "list-item",
        "table" => "table",
        "caption" => "table-caption",
        "colgroup" => "table-column-group",
        "col" => "table-column",
        "thead" => "table-header-group",
        "tbody" => "table-row-group",
        "tfoot" => "table-footer-group",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "button" | "canvas" | "iframe" | "img" | "input" | "meter" | "progress" | "select"
        | "textarea" | "video" => "inline-block",
        "base" | "head" | "link" | "meta" | "noscript" | "script" | "style" | "template"
        | "title" => "none",
        _ => "inline",
    }
}

/// The initial value of a property when nothing sets or inherits it.
fn initial_value(property: &str) -> &'static str {
    match property {
        "opacity" => "1",
        "visibility" | "content-visibility" | "overflow" | "overflow-x" | "overflow-y" => {
            "visible"
        }
        "position" => "static",
        "transform" | "filter" | "perspective" | "contain" | "backdrop-filter" | "clip-path" => {
            "none"
        }
        "will-change" | "z-index" => "auto",
        "container-type" => "normal",
        _ => "",
    }
}

/// Parses a declaration block such as `color: red; display: none !important`.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    for part in split_top_level(text, ';') {
        let Some((property, value)) = part.split_once(':') else {
            continue;
        };
        let property = normalize_property(property);
        if property.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        let mut important = false;
        if let Some(at) = value.to_ascii_lowercase().rfind("!important") {
            if value[at + "!important".len()..].trim().is_empty() {
                value.truncate(at);
                value = value.trim_end().to_string();
                important = true;
            }
        }
        out.push(Declaration {
            property,
            value,
            important,
        });
    }
    out
}

/// Splits on `separator` outside parentheses and quotes.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a stylesheet. At-rules and rules with unsupported selectors are
/// skipped.
pub fn parse_stylesheet(css: &str) -> Vec<StyleRule> {
    let css = strip_comments(css);
    let mut rules = Vec::new();
    let mut rest = css.as_str();
    while let Some(open) = rest.find('{') {
        let prelude = rest[..open].trim();
        let body_start = open + 1;
        let mut depth = 1usize;
        let mut end = rest.len();
        for (i, c) in rest[body_start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = body_start + i;
                        break;
                    }
                }
                _ => {}
            }
        }
        let body = &rest[body_start..end];
        rest = rest.get(end + 1..).unwrap_or("");
        if prelude.starts_with('@') {
            continue;
        }
        match Selector::parse(prelude) {
            Ok(selector) => rules.push(StyleRule {
                selector,
                declarations: parse_declarations(body),
            }),
            Err(err) => tracing::debug!(%err, "skipping style rule"),
        }
    }
    rules
}

/// Replaces `var(--name[, fallback])` references using `lookup`.
fn resolve_vars(value: &str, lookup: &dyn Fn(&str) -> Option<String>, depth: usize) -> String {
    if depth > 16 || !value.contains("var(") {
        return value.to_string();
    }
    let mut out = String::new();
    let mut rest = value;
    while let Some(at) = rest.find("var(") {
        out.push_str(&rest[..at]);
        let inner_start = at + 4;
        let mut level = 1usize;
        let mut end = None;
        for (i, c) in rest[inner_start..].char_indices() {
            match c {
                '(' => level += 1,
                ')' => {
                    level -= 1;
                    if level == 0 {
                        end = Some(inner_start + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(end) = end else {
            out.push_str(&rest[at..]);
            return out;
        };
        let inner = &rest[inner_start..end];
        let (name, fallback) = match inner.split_once(',') {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
            None => (inner.trim(), None),
        };
        let resolved = lookup(name)
            .filter(|v| !v.is_empty())
            .or_else(|| fallback.map(str::to_string))
            .unwrap_or_default();
        out.push_str(&resolve_vars(&resolved, lookup, depth + 1));
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn inline_declarations(tree: &DomTree, id: NodeId) -> Vec<Declaration> {
    tree.element(id)
        .and_then(|e| e.attrs.get("style"))
        .map(|s| parse_declarations(s))
        .unwrap_or_default()
}

/// Stylesheet rules in scope for `id`, in source order.
fn scoped_rules(tree: &DomTree, id: NodeId) -> Vec<StyleRule> {
    let scope = tree.tree_root(id);
    tree.descendants(scope)
        .into_iter()
        .filter(|&n| tree.element(n).is_some_and(|e| e.tag == "style"))
        .flat_map(|n| parse_stylesheet(&tree.text_content(n)))
        .collect()
}

fn composed_parent_element(tree: &DomTree, id: NodeId) -> Option<NodeId> {
    let mut current = tree.composed_parent(id);
    while let Some(node) = current {
        if tree.is_element(node) {
            return Some(node);
        }
        current = tree.composed_parent(node);
    }
    None
}

/// The winning stylesheet declaration for `property` among those accepted
/// by `accept`: importance first, then specificity, then source order.
fn winning_rule_value(
    tree: &DomTree,
    id: NodeId,
    property: &str,
    accept: impl Fn(&Declaration) -> bool,
) -> Option<(bool, String)> {
    let mut best: Option<(bool, Specificity, usize, String)> = None;
    for (order, rule) in scoped_rules(tree, id).into_iter().enumerate() {
        let Some(specificity) = rule.selector.match_specificity(tree, id) else {
            continue;
        };
        for decl in rule
            .declarations
            .iter()
            .filter(|d| d.property == property && accept(d))
        {
            let candidate = (decl.important, specificity, order);
            let wins = best
                .as_ref()
                .map_or(true, |(i, s, o, _)| candidate >= (*i, *s, *o));
            if wins {
                best = Some((decl.important, specificity, order, decl.value.clone()));
            }
        }
    }
    best.map(|(important, _, _, value)| (important, value))
}

/// The cascaded value before inheritance and defaults.
fn cascaded(tree: &DomTree, id: NodeId, property: &str) -> Option<String> {
    let inline = inline_declarations(tree, id);
    let inline_value = |important: bool| {
        inline
            .iter()
            .rev()
            .find(|d| d.property == property && d.important == important)
            .map(|d| d.value.clone())
    };
    if let Some(value) = inline_value(true) {
        return Some(value);
    }
    match winning_rule_value(tree, id, property, |_| true) {
        Some((true, value)) => Some(value),
        rule => inline_value(false).or(rule.map(|(_, value)| value)),
    }
}

/// The value after cascade, inheritance and defaults, with `var()`
/// references left in place.
fn specified_value(tree: &DomTree, id: NodeId, property: &str) -> String {
    match cascaded(tree, id, property) {
        Some(v) if v.eq_ignore_ascii_case("inherit") => inherited_value(tree, id, property),
        Some(v) if v.eq_ignore_ascii_case("initial") => default_value(tree, id, property),
        Some(v) if v.eq_ignore_ascii_case("unset") => {
            if is_inherited(property) {
                inherited_value(tree, id, property)
            } else {
                default_value(tree, id, property)
            }
        }
        Some(v) => v,
        None if is_inherited(property) => inherited_value(tree, id, property),
        None => default_value(tree, id, property),
    }
}

pub(crate) fn computed_value(tree: &DomTree, id: NodeId, property: &str) -> String {
    let property = normalize_property(property);
    let value = specified_value(tree, id, &property);
    resolve_vars(
        &value,
        &|name: &str| Some(specified_value(tree, id, name)),
        0,
    )
}

fn inherited_value(tree: &DomTree, id: NodeId, property: &str) -> String {
    match composed_parent_element(tree, id) {
        Some(parent) => specified_value(tree, parent, property),
        None => default_value(tree, id, property),
    }
}

fn default_value(tree: &DomTree, id: NodeId, property: &str) -> String {
    if property == "display" {
        return match tree.element(id) {
            Some(e) if e.attrs.contains_key("hidden") => "none".to_string(),
            Some(e) => default_display(&e.tag).to_string(),
            None => String::new(),
        };
    }
    initial_value(property).to_string()
}

/// Whether the element or a composed ancestor computes to `display: none`.
pub(crate) fn display_none(tree: &DomTree, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(node) = current {
        if tree.is_element(node) && computed_value(tree, node, "display") == "none" {
            return true;
        }
        current = composed_parent_element(tree, node);
    }
    false
}

fn write_inline(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.property, d.value)
            } else {
                format!("{}: {};", d.property, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Document {
    /// An inline style value.
    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        let property = normalize_property(property);
        self.with(|t| {
            inline_declarations(t, id)
                .into_iter()
                .rev()
                .find(|d| d.property == property)
                .map(|d| d.value)
        })
    }

    /// Sets an inline style. An empty value removes the property.
    pub fn set_style(&self, id: NodeId, property: &str, value: &str) {
        let property = normalize_property(property);
        let mut declarations = self.with(|t| inline_declarations(t, id));
        let value = value.trim();
        if value.is_empty() {
            declarations.retain(|d| d.property != property);
        } else {
            let mut parsed = parse_declarations(&format!("{property}: {value}"));
            let Some(new) = parsed.pop() else {
                return;
            };
            match declarations.iter_mut().find(|d| d.property == property) {
                Some(existing) => *existing = new,
                None => declarations.push(new),
            }
        }
        self.write_style_attribute(id, &declarations);
    }

    /// Removes an inline style, returning its old value.
    pub fn remove_style(&self, id: NodeId, property: &str) -> Option<String> {
        let old = self.style(id, property);
        if old.is_some() {
            self.set_style(id, property, "");
        }
        old
    }

    fn write_style_attribute(&self, id: NodeId, declarations: &[Declaration]) {
        if declarations.is_empty() {
            self.remove_attribute(id, "style");
        } else {
            self.set_attribute(id, "style", &write_inline(declarations));
        }
    }

    /// The computed value of a property.
    pub fn computed_style(&self, id: NodeId, property: &str) -> String {
        self.with(|t| computed_value(t, id, property))
    }

    /// The `display` an element gets from stylesheet rules and the
    /// user-agent defaults, ignoring its inline style and any `none`.
    pub fn cascaded_display(&self, id: NodeId) -> String {
        self.with(|t| {
            winning_rule_value(t, id, "display", |d| !d.value.eq_ignore_ascii_case("none"))
                .map(|(_, value)| value)
                .unwrap_or_else(|| {
                    t.element(id)
                        .map(|e| default_display(&e.tag).to_string())
                        .unwrap_or_default()
                })
        })
    }

    /// Whether the element or a composed ancestor has `display: none`.
    pub fn is_display_none(&self, id: NodeId) -> bool {
        self.with(|t| display_none(t, id))
    }

    /// The viewport-relative border box. Zero when the element has no layout
    /// or is not rendered.
    pub fn bounding_rect(&self, id: NodeId) -> Rect {
        self.with(|t| {
            let Some(layout) = t.element(id).and_then(|e| e.layout) else {
                return Rect::default();
            };
            if display_none(t, id) || !t.composed_contains(Document::ROOT, id) {
                return Rect::default();
            }
            layout.border_box
        })
    }
}
