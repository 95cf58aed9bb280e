//! Built-in template helpers and the helper registry.
//!
//! Helpers are pure functions over already-evaluated arguments. They are
//! looked up by name after template methods, so a template can shadow any
//! of them.

use crate::error::HelperError;
use crate::value::{as_number, loose_eq, number, strict_eq, stringify, truthy};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::fmt::{self, Write as _};
use std::sync::{Arc, RwLock};

/// A helper function.
pub type Helper = Arc<dyn Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync>;

/// Longest sequence `range` will produce.
const MAX_RANGE_LEN: usize = 10_000;

/// Name-to-function table consulted when an expression calls something that
/// is not a template method.
pub struct HelperRegistry {
    helpers: RwLock<FxHashMap<SmolStr, Helper>>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.names())
            .finish()
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            helpers: RwLock::new(FxHashMap::default()),
        }
    }

    /// A registry holding every built-in helper.
    pub fn builtin() -> Self {
        let registry = Self::new();
        register_logical(&registry);
        register_strings(&registry);
        register_classes(&registry);
        register_collections(&registry);
        register_dates(&registry);
        register_debug(&registry);
        registry
    }

    /// Registers or replaces a helper.
    pub fn register(
        &self,
        name: &str,
        helper: impl Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    ) {
        self.helpers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(SmolStr::new(name), Arc::new(helper));
    }

    /// Looks up a helper.
    pub fn get(&self, name: &str) -> Option<Helper> {
        self.helpers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Whether a helper is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Calls a helper, or returns `None` when it does not exist.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, HelperError>> {
        let helper = self.get(name)?;
        Some(helper(args))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self
            .helpers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn text_arg(args: &[Value], index: usize) -> String {
    stringify(arg(args, index))
}

fn compare(args: &[Value], test: fn(f64, f64) -> bool) -> Result<Value, HelperError> {
    let (a, b) = (arg(args, 0), arg(args, 1));
    let result = match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) if !a.is_string() || !b.is_string() => test(x, y),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => {
                let ordering = x.cmp(y);
                test(ordering as i32 as f64, 0.0)
            }
            _ => false,
        },
    };
    Ok(Value::Bool(result))
}

fn register_logical(registry: &HelperRegistry) {
    registry.register("not", |args| Ok(Value::Bool(!truthy(arg(args, 0)))));
    registry.register("is", |args| {
        Ok(Value::Bool(loose_eq(arg(args, 0), arg(args, 1))))
    });
    registry.register("isExactly", |args| {
        Ok(Value::Bool(strict_eq(arg(args, 0), arg(args, 1))))
    });
    registry.register("notEqual", |args| {
        Ok(Value::Bool(!loose_eq(arg(args, 0), arg(args, 1))))
    });
    registry.register("isNotExactly", |args| {
        Ok(Value::Bool(!strict_eq(arg(args, 0), arg(args, 1))))
    });
    registry.register("greaterThan", |args| compare(args, |a, b| a > b));
    registry.register("lessThan", |args| compare(args, |a, b| a < b));
    registry.register("greaterThanEquals", |args| compare(args, |a, b| a >= b));
    registry.register("lessThanEquals", |args| compare(args, |a, b| a <= b));
    registry.register("and", |args| {
        Ok(Value::Bool(!args.is_empty() && args.iter().all(truthy)))
    });
    registry.register("or", |args| Ok(Value::Bool(args.iter().any(truthy))));
    registry.register("exists", |args| Ok(Value::Bool(!arg(args, 0).is_null())));
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn register_strings(registry: &HelperRegistry) {
    registry.register("capitalize", |args| {
        Ok(Value::String(capitalize(&text_arg(args, 0))))
    });
    registry.register("titleCase", |args| {
        let text = text_arg(args, 0);
        let mut out = String::with_capacity(text.len());
        let mut at_word_start = true;
        for c in text.chars() {
            if at_word_start && c.is_alphanumeric() {
                out.extend(c.to_uppercase());
                at_word_start = false;
            } else {
                out.push(c);
                if c.is_whitespace() || c == '-' || c == '_' {
                    at_word_start = true;
                }
            }
        }
        Ok(Value::String(out))
    });
    registry.register("uppercase", |args| {
        Ok(Value::String(text_arg(args, 0).to_uppercase()))
    });
    registry.register("lowercase", |args| {
        Ok(Value::String(text_arg(args, 0).to_lowercase()))
    });
    registry.register("concat", |args| {
        Ok(Value::String(args.iter().map(stringify).collect()))
    });
    registry.register("join", |args| {
        let separator = match arg(args, 1) {
            Value::Null => " ".to_string(),
            other => stringify(other),
        };
        match arg(args, 0) {
            Value::Array(items) => Ok(Value::String(
                items
                    .iter()
                    .map(stringify)
                    .collect::<Vec<_>>()
                    .join(&separator),
            )),
            Value::Null => Ok(Value::String(String::new())),
            other => Err(HelperError::new(format!(
                "join expects an array, found {}",
                crate::value::kind_name(other)
            ))),
        }
    });
    registry.register("truncate", |args| {
        let text = text_arg(args, 0);
        let Some(limit) = as_number(arg(args, 1)) else {
            return Err(HelperError::new("truncate expects a length"));
        };
        let limit = limit.max(0.0) as usize;
        let suffix = match arg(args, 2) {
            Value::Null => "...".to_string(),
            other => stringify(other),
        };
        if text.chars().count() <= limit {
            return Ok(Value::String(text));
        }
        let mut out: String = text.chars().take(limit).collect();
        out.push_str(&suffix);
        Ok(Value::String(out))
    });
}

fn class_when(
    class: &'static str,
) -> impl Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync + 'static {
    move |args| {
        Ok(Value::String(if truthy(arg(args, 0)) {
            class.to_string()
        } else {
            String::new()
        }))
    }
}

fn register_classes(registry: &HelperRegistry) {
    registry.register("activeIf", class_when("active"));
    registry.register("selectedIf", class_when("selected"));
    registry.register("disabledIf", class_when("disabled"));
    registry.register("checkedIf", class_when("checked"));
    registry.register("classIf", |args| {
        let chosen = if truthy(arg(args, 0)) {
            arg(args, 1)
        } else {
            arg(args, 2)
        };
        Ok(Value::String(stringify(chosen)))
    });
    registry.register("maybe", |args| {
        Ok(if truthy(arg(args, 1)) {
            arg(args, 0).clone()
        } else {
            Value::String(String::new())
        })
    });
    registry.register("classMap", |args| match arg(args, 0) {
        Value::Object(map) => Ok(Value::String(
            map.iter()
                .filter(|(_, on)| truthy(on))
                .map(|(class, _)| class.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )),
        Value::Null => Ok(Value::String(String::new())),
        other => Err(HelperError::new(format!(
            "classMap expects an object, found {}",
            crate::value::kind_name(other)
        ))),
    });
}

fn size(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    }
}

fn register_collections(registry: &HelperRegistry) {
    registry.register("hasAny", |args| Ok(Value::Bool(size(arg(args, 0)) > 0)));
    registry.register("count", |args| Ok(Value::from(size(arg(args, 0)))));
    registry.register("arrayFromObject", |args| match arg(args, 0) {
        Value::Object(map) => Ok(Value::Array(
            map.iter()
                .map(|(key, value)| {
                    let mut entry = Map::new();
                    entry.insert("key".into(), Value::String(key.clone()));
                    entry.insert("value".into(), value.clone());
                    Value::Object(entry)
                })
                .collect(),
        )),
        Value::Null => Ok(Value::Array(Vec::new())),
        other => Err(HelperError::new(format!(
            "arrayFromObject expects an object, found {}",
            crate::value::kind_name(other)
        ))),
    });
    registry.register("range", |args| {
        let numbers: Vec<f64> = args.iter().filter_map(as_number).collect();
        let (start, end, step) = match numbers.as_slice() {
            [end] => (0.0, *end, 1.0),
            [start, end] => (*start, *end, 1.0),
            [start, end, step, ..] => (*start, *end, *step),
            [] => return Err(HelperError::new("range expects numeric bounds")),
        };
        if step == 0.0 || !step.is_finite() {
            return Err(HelperError::new("range step must be a non-zero number"));
        }
        let mut out = Vec::new();
        let mut current = start;
        while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
            if out.len() == MAX_RANGE_LEN {
                return Err(HelperError::new(format!(
                    "range would produce more than {MAX_RANGE_LEN} values"
                )));
            }
            out.push(number(current));
            current += step;
        }
        Ok(Value::Array(out))
    });
    registry.register("numberFromIndex", |args| {
        let index = as_number(arg(args, 0)).unwrap_or(0.0);
        Ok(number(index + 1.0))
    });
}

/// Translates `YYYY-MM-DD`-style tokens to strftime. Formats that already
/// contain `%` are used as they are.
fn strftime_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("A", "%p"),
    ];
    let mut out = String::with_capacity(format.len() + 8);
    let mut rest = format;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64()? as i64;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_local());
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

fn format_date(args: &[Value], default_format: &str) -> Result<Value, HelperError> {
    let date = arg(args, 0);
    if date.is_null() {
        return Ok(Value::String(String::new()));
    }
    let Some(date) = parse_date(date) else {
        return Err(HelperError::new(format!(
            "cannot read `{}` as a date",
            stringify(date)
        )));
    };
    let format = match arg(args, 1) {
        Value::String(f) => strftime_format(f),
        _ => strftime_format(default_format),
    };
    let items = StrftimeItems::new(&format);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(HelperError::new(format!("invalid date format `{format}`")));
    }
    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items))
        .map_err(|_| HelperError::new(format!("cannot format date with `{format}`")))?;
    Ok(Value::String(out))
}

fn register_dates(registry: &HelperRegistry) {
    registry.register("formatDate", |args| format_date(args, "YYYY-MM-DD"));
    registry.register("formatDateTime", |args| {
        format_date(args, "YYYY-MM-DD HH:mm")
    });
}

fn register_debug(registry: &HelperRegistry) {
    registry.register("log", |args| {
        let shown: Vec<String> = args.iter().map(Value::to_string).collect();
        tracing::info!(target: "template", "{}", shown.join(" "));
        Ok(Value::Null)
    });
    registry.register("debugger", |args| {
        tracing::debug!(target: "template", ?args, "debugger helper reached");
        Ok(Value::Null)
    });
    registry.register("stringify", |args| {
        Ok(Value::String(arg(args, 0).to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Value {
        HelperRegistry::builtin()
            .call(name, args)
            .unwrap_or_else(|| panic!("missing helper {name}"))
            .unwrap()
    }

    #[test]
    fn test_logical() {
        assert_eq!(call("is", &[json!("2"), json!(2)]), json!(true));
        assert_eq!(call("isExactly", &[json!("2"), json!(2)]), json!(false));
        assert_eq!(call("greaterThan", &[json!(3), json!("2")]), json!(true));
        assert_eq!(call("lessThanEquals", &[json!("a"), json!("b")]), json!(true));
        assert_eq!(call("and", &[json!(1), json!("x")]), json!(true));
        assert_eq!(call("or", &[json!(0), json!(null)]), json!(false));
        assert_eq!(call("exists", &[json!(0)]), json!(true));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("titleCase", &[json!("hello big world")]), json!("Hello Big World"));
        assert_eq!(call("capitalize", &[json!("ada")]), json!("Ada"));
        assert_eq!(call("concat", &[json!("a"), json!(1), json!(null)]), json!("a1"));
        assert_eq!(call("join", &[json!(["a", "b"]), json!(", ")]), json!("a, b"));
        assert_eq!(call("truncate", &[json!("abcdef"), json!(3)]), json!("abc..."));
    }

    #[test]
    fn test_classes_and_collections() {
        assert_eq!(call("activeIf", &[json!(true)]), json!("active"));
        assert_eq!(call("classIf", &[json!(0), json!("on"), json!("off")]), json!("off"));
        assert_eq!(
            call("classMap", &[json!({"a": true, "b": false, "c": 1})]),
            json!("a c")
        );
        assert_eq!(call("range", &[json!(1), json!(4)]), json!([1, 2, 3]));
        assert_eq!(call("range", &[json!(3)]), json!([0, 1, 2]));
        assert_eq!(
            call("arrayFromObject", &[json!({"x": 1})]),
            json!([{"key": "x", "value": 1}])
        );
        assert_eq!(call("numberFromIndex", &[json!(0)]), json!(1));
        assert_eq!(call("count", &[json!({"a": 1, "b": 2})]), json!(2));
    }

    #[test]
    fn test_dates() {
        assert_eq!(call("formatDate", &[json!("2024-03-09T14:05:00Z")]), json!("2024-03-09"));
        assert_eq!(
            call("formatDate", &[json!("2024-03-09"), json!("MMM DD, YYYY")]),
            json!("Mar 09, 2024")
        );
        assert_eq!(
            call("formatDateTime", &[json!(0)]),
            json!("1970-01-01 00:00")
        );
        assert!(HelperRegistry::builtin()
            .call("formatDate", &[json!("not a date")])
            .unwrap()
            .is_err());
    }

    #[test]
    fn test_register_overrides() {
        let registry = HelperRegistry::builtin();
        registry.register("not", |_| Ok(json!("custom")));
        assert_eq!(registry.call("not", &[]).unwrap().unwrap(), json!("custom"));
        assert!(registry.call("missing", &[]).is_none());
    }
}
