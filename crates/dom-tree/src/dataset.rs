//! `data-*` attributes as typed values.

use crate::document::Document;
use crate::node::NodeId;
use serde_json::{Map, Number, Value};

/// `item-id` → `itemId`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `itemId` → `item-id`.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts an attribute string: numeric text becomes a number, `true` and
/// `false` become booleans, anything else stays a string.
pub fn convert_data_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let numeric = !raw.is_empty()
        && raw.trim() == raw
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    if numeric {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

impl Document {
    /// Every `data-*` attribute, camelCased and type-converted.
    pub fn dataset(&self, id: NodeId) -> Map<String, Value> {
        self.attributes(id)
            .into_iter()
            .filter_map(|(name, value)| {
                let key = name.strip_prefix("data-")?;
                Some((camel_case(key), convert_data_value(&value)))
            })
            .collect()
    }

    /// One `data-*` value by camelCase or kebab-case key.
    pub fn data(&self, id: NodeId, key: &str) -> Option<Value> {
        self.get_attribute(id, &format!("data-{}", kebab_case(key)))
            .map(|v| convert_data_value(&v))
    }

    /// Writes a `data-*` attribute. Strings are stored as-is, other values as
    /// JSON text.
    pub fn set_data(&self, id: NodeId, key: &str, value: &Value) {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.set_attribute(id, &format!("data-{}", kebab_case(key)), &text);
    }

    /// Removes a `data-*` attribute.
    pub fn remove_data(&self, id: NodeId, key: &str) -> Option<String> {
        self.remove_attribute(id, &format!("data-{}", kebab_case(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_case_conversion() {
        assert_eq!(camel_case("item-id"), "itemId");
        assert_eq!(camel_case("x"), "x");
        assert_eq!(kebab_case("itemId"), "item-id");
        assert_eq!(kebab_case("item-id"), "item-id");
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(convert_data_value("123"), json!(123));
        assert_eq!(convert_data_value("-1.5"), json!(-1.5));
        assert_eq!(convert_data_value("true"), json!(true));
        assert_eq!(convert_data_value("false"), json!(false));
        assert_eq!(convert_data_value("12px"), json!("12px"));
        assert_eq!(convert_data_value(""), json!(""));
        assert_eq!(convert_data_value(" 1"), json!(" 1"));
        assert_eq!(convert_data_value("e"), json!("e"));
    }

    #[test]
    fn test_dataset() {
        let doc = Document::from_html(
            "<li data-item-id=\"123\" data-active=\"true\" data-label=\"Apples\" class=\"x\"></li>",
        );
        let li = doc.element_children(doc.body())[0];
        assert_eq!(
            Value::Object(doc.dataset(li)),
            json!({ "itemId": 123, "active": true, "label": "Apples" })
        );
        doc.set_data(li, "itemId", &json!(7));
        assert_eq!(doc.data(li, "item-id"), Some(json!(7)));
        assert_eq!(doc.remove_data(li, "label").as_deref(), Some("Apples"));
        assert_eq!(doc.data(li, "label"), None);
    }
}
