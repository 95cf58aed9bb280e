//! String rendering.
//!
//! Walks a prepared [`Fragment`] against a data context and writes markup.
//! Live instances reuse the attribute rules and branch selection below, so a
//! string render and the DOM it would hydrate into always agree.

use crate::error::EvalError;
use crate::eval::{entries, Binding, Env, ItemFrame};
use crate::program::{EachPart, Fragment, IfPart, Part, Piece};
use crate::value::{escape_html, literal_value, stringify, truthy};
use dom_tree::decode_entities;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use template_compiler::{ExpressionContext, PartialNode, StringScanner};

/// Writes the markup of `fragment`.
pub(crate) fn render_fragment(env: &Env<'_>, fragment: &Fragment, out: &mut String) {
    for piece in &fragment.pieces {
        match piece {
            Piece::Html(html) => out.push_str(html),
            Piece::Part(index) => {
                if let Some(part) = fragment.parts.get(*index) {
                    render_part(env, part, out);
                }
            }
        }
    }
}

/// Writes the markup of one part.
pub(crate) fn render_part(env: &Env<'_>, part: &Part, out: &mut String) {
    match part {
        Part::Expression(node) => {
            let value = env.evaluate(&node.expr, &node.source);
            match &node.context {
                ExpressionContext::Text | ExpressionContext::QuotedAttribute { .. } => {
                    if node.unsafe_html {
                        out.push_str(&stringify(&value));
                    } else {
                        out.push_str(&escape_html(&stringify(&value)));
                    }
                }
                ExpressionContext::UnquotedAttribute { name } => {
                    out.push_str(&attribute_markup(name, &value));
                }
                ExpressionContext::TagBody => {
                    for (name, value) in tag_body_attributes(&value) {
                        if !out.ends_with(char::is_whitespace) {
                            out.push(' ');
                        }
                        out.push_str(&name);
                        if !value.is_empty() {
                            out.push_str("=\"");
                            out.push_str(&escape_html(&value));
                            out.push('"');
                        }
                    }
                }
            }
        }
        Part::If(part) => {
            let selected = select_branch(env, part);
            render_fragment(env, &part.branches[selected], out);
        }
        Part::Each(part) => render_each(env, part, out),
        Part::Partial(node) => render_partial(env, node, out),
        Part::Slot(name) => {
            if let Some(slot) = env.template.slot(name) {
                render_fragment(env, &slot, out);
            }
        }
        Part::Rerender(part) => render_fragment(env, &part.content, out),
    }
}

/// The text a part contributes to an attribute value, a comment or raw text.
pub(crate) fn part_text(env: &Env<'_>, part: &Part) -> String {
    match part {
        Part::Expression(node) => stringify(&env.evaluate(&node.expr, &node.source)),
        other => {
            let mut out = String::new();
            render_part(env, other, &mut out);
            out
        }
    }
}

/// The index of the first branch whose condition holds, or of the trailing
/// `else` branch.
pub(crate) fn select_branch(env: &Env<'_>, part: &IfPart) -> usize {
    part.conditions
        .iter()
        .position(|(condition, source)| truthy(&env.evaluate(condition, source)))
        .unwrap_or(part.conditions.len())
}

fn render_each(env: &Env<'_>, part: &EachPart, out: &mut String) {
    let collection = env.evaluate(&part.over, &part.over_source);
    let list = match entries(collection) {
        Ok(list) => list,
        Err(found) => {
            env.template.record_error(EvalError::NotIterable {
                expression: part.over_source.clone(),
                template: env.template.name().clone(),
                found,
            });
            Vec::new()
        }
    };
    if list.is_empty() {
        if let Some(fallback) = &part.else_content {
            render_fragment(env, fallback, out);
        }
        return;
    }
    for entry in list {
        let scope = env.scope.child(ItemFrame {
            item: Binding::Fixed(entry.item),
            index: Binding::Fixed(Value::from(entry.index)),
            key: Binding::Fixed(entry.key),
            item_as: part.item_as.clone(),
            index_as: part.index_as.clone(),
        });
        let child = Env {
            template: env.template,
            scope: &scope,
            extra: env.extra,
        };
        render_fragment(&child, &part.content, out);
    }
}

fn render_partial(env: &Env<'_>, node: &PartialNode, out: &mut String) {
    let Some(definition) = env.template.resolve_partial(&node.name) else {
        env.template.record_error(EvalError::UnknownPartial {
            partial: node.name.clone(),
            template: env.template.name().clone(),
        });
        return;
    };
    let child = env
        .template
        .runtime()
        .create(&definition, Some(Value::Object(static_data(node))));
    for arg in &node.reactive_data {
        child
            .state()
            .set(&arg.name, env.evaluate(&arg.expr, &arg.source));
    }
    out.push_str(&child.render(None));
    for error in child.errors() {
        env.template.record_error(error);
    }
}

/// The literal arguments of a partial tag.
pub(crate) fn static_data(node: &PartialNode) -> Map<String, Value> {
    node.data
        .iter()
        .map(|arg| (arg.name.to_string(), literal_value(&arg.value)))
        .collect()
}

/// How an unquoted attribute renders: `None` drops it, an empty string is a
/// bare attribute, anything else is its value.
pub(crate) fn attribute_value(value: &Value) -> Option<String> {
    if !truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        _ => Some(String::new()),
    }
}

/// The markup of an unquoted attribute, with a leading space.
pub(crate) fn attribute_markup(name: &str, value: &Value) -> String {
    match attribute_value(value) {
        None => String::new(),
        Some(v) if v.is_empty() => format!(" {name}"),
        Some(v) => format!(" {name}=\"{}\"", escape_html(&v)),
    }
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<'))
}

/// The attributes a tag body expression contributes: an object maps names
/// to values under the unquoted rules, a string is read as attribute markup.
pub(crate) fn tag_body_attributes(value: &Value) -> Vec<(SmolStr, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(name, _)| is_attribute_name(name))
            .filter_map(|(name, v)| attribute_value(v).map(|v| (SmolStr::new(name), v)))
            .collect(),
        Value::String(markup) => parse_attributes(markup),
        _ => Vec::new(),
    }
}

/// Reads `name`, `name=value` and `name="value"` pairs.
fn parse_attributes(markup: &str) -> Vec<(SmolStr, String)> {
    let mut scanner = StringScanner::new(markup);
    let mut out: Vec<(SmolStr, String)> = Vec::new();
    loop {
        scanner.skip_whitespace();
        if scanner.is_eof() {
            break;
        }
        let name = scanner.consume_while(|c| !c.is_whitespace() && c != '=');
        if name.is_empty() || !is_attribute_name(name) {
            // Skip the offending character and carry on.
            scanner.bump();
            continue;
        }
        scanner.skip_whitespace();
        let mut value = String::new();
        if scanner.consume("=") {
            scanner.skip_whitespace();
            match scanner.peek() {
                Some(quote @ ('"' | '\'')) => {
                    scanner.bump();
                    value = decode_entities(scanner.consume_until(&quote.to_string()));
                    scanner.bump();
                }
                _ => {
                    value = decode_entities(scanner.consume_while(|c| !c.is_whitespace()));
                }
            }
        }
        let name = SmolStr::new(name.to_ascii_lowercase());
        if !out.iter().any(|(existing, _)| *existing == name) {
            out.push((name, value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_attribute_rules() {
        assert_eq!(attribute_markup("checked", &json!(true)), " checked");
        assert_eq!(attribute_markup("checked", &json!(0)), "");
        assert_eq!(attribute_markup("checked", &json!("")), "");
        assert_eq!(
            attribute_markup("title", &json!("a \"b\"")),
            " title=\"a &quot;b&quot;\""
        );
    }

    #[test]
    fn test_tag_body_attributes() {
        assert_eq!(
            tag_body_attributes(&json!({"disabled": true, "hidden": false, "id": "x", "bad name": 1})),
            vec![(SmolStr::new("disabled"), String::new()), (SmolStr::new("id"), "x".into())]
        );
        assert_eq!(
            tag_body_attributes(&json!("data-a=1 title='a &amp; b' open")),
            vec![
                (SmolStr::new("data-a"), "1".into()),
                (SmolStr::new("title"), "a & b".into()),
                (SmolStr::new("open"), String::new()),
            ]
        );
    }
}
