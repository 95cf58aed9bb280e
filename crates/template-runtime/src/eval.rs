//! Expression evaluation against a template's data context.
//!
//! Names resolve innermost first: `each` frames, then extra render data,
//! then reactive state, then settings, then zero-argument template methods.
//! Calls try template methods before helpers.

use crate::error::EvalError;
use crate::template::Template;
use crate::value::{get_segment, literal_value};
use reactive::Signal;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::rc::Rc;
use template_compiler::{Call, Expr, Path};

/// A value bound by an `each` frame: a signal for live items, a plain value
/// for string renders.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    Live(Signal<Value>),
    Fixed(Value),
}

impl Binding {
    pub(crate) fn get(&self) -> Value {
        match self {
            Binding::Live(signal) => signal.get(),
            Binding::Fixed(value) => value.clone(),
        }
    }
}

/// The bindings of one `each` iteration.
#[derive(Debug, Clone)]
pub(crate) struct ItemFrame {
    pub(crate) item: Binding,
    /// Position in the collection.
    pub(crate) index: Binding,
    /// Array index or object key.
    pub(crate) key: Binding,
    pub(crate) item_as: Option<SmolStr>,
    pub(crate) index_as: Option<SmolStr>,
}

/// A chain of `each` frames.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    parent: Option<Rc<Scope>>,
    frame: Option<ItemFrame>,
}

impl Scope {
    /// The scope of a template's top level.
    pub(crate) fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A scope with one more `each` frame.
    pub(crate) fn child(self: &Rc<Self>, frame: ItemFrame) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(self.clone()),
            frame: Some(frame),
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(frame) = &current.frame {
                if let Some(value) = frame.lookup(name) {
                    return Some(value);
                }
            }
            scope = current.parent.as_deref();
        }
        None
    }
}

impl ItemFrame {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "this" => return Some(self.item.get()),
            "@index" => return Some(self.index.get()),
            "@key" => return Some(self.key.get()),
            _ => {}
        }
        if self.item_as.as_deref() == Some(name) {
            return Some(self.item.get());
        }
        if self.index_as.as_deref() == Some(name) {
            return Some(self.key.get());
        }
        if self.item_as.is_none() {
            if let Value::Object(map) = self.item.get() {
                return map.get(name).cloned();
            }
        }
        None
    }
}

/// What an expression is evaluated against.
pub(crate) struct Env<'a> {
    pub(crate) template: &'a Template,
    pub(crate) scope: &'a Rc<Scope>,
    pub(crate) extra: Option<&'a Map<String, Value>>,
}

impl<'a> Env<'a> {
    pub(crate) fn new(template: &'a Template, scope: &'a Rc<Scope>) -> Self {
        Self {
            template,
            scope,
            extra: None,
        }
    }

    /// Evaluates `expr`. Failures are recorded on the template and yield
    /// `null`.
    pub(crate) fn evaluate(&self, expr: &Expr, source: &str) -> Value {
        match self.eval(expr, source) {
            Ok(value) => value,
            Err(error) => {
                self.template.record_error(error);
                Value::Null
            }
        }
    }

    /// Evaluates `expr`, propagating the first failure.
    pub(crate) fn eval(&self, expr: &Expr, source: &str) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Path(path) => Ok(self.resolve(path)),
            Expr::Call(call) => self.call(call, source),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, source))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for entry in entries {
                    map.insert(entry.key.to_string(), self.eval(&entry.value, source)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn resolve(&self, path: &Path) -> Value {
        let Some((root, rest)) = path.segments.split_first() else {
            return Value::Null;
        };
        let value = self.lookup(root).unwrap_or(Value::Null);
        rest.iter()
            .fold(value, |current, segment| get_segment(&current, segment))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.scope.lookup(name) {
            return Some(value);
        }
        if let Some(value) = self.extra.and_then(|extra| extra.get(name)) {
            return Some(value.clone());
        }
        if let Some(value) = self.template.state().lookup(name) {
            return Some(value);
        }
        if let Some(value) = self.template.setting(name) {
            return Some(value);
        }
        let method = self.template.definition().method(name)?;
        Some(method(self.template, &[]))
    }

    fn call(&self, call: &Call, source: &str) -> Result<Value, EvalError> {
        let args = call
            .args
            .iter()
            .map(|arg| self.eval(arg, source))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(method) = self.template.definition().method(&call.name) {
            return Ok(method(self.template, &args));
        }
        match self.template.runtime().helpers().call(&call.name, &args) {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(EvalError::HelperFailed {
                helper: call.name.clone(),
                template: self.template.name().clone(),
                expression: source.to_string(),
                message: error.0,
            }),
            None => Err(EvalError::UnknownHelper {
                helper: call.name.clone(),
                template: self.template.name().clone(),
                expression: source.to_string(),
            }),
        }
    }
}

/// One entry of an iterated collection.
pub(crate) struct Entry {
    pub(crate) item: Value,
    pub(crate) index: usize,
    pub(crate) key: Value,
}

/// Enumerates an `each` collection: arrays by index, objects in insertion
/// order. `null` iterates as empty; other scalars are an error.
pub(crate) fn entries(collection: Value) -> Result<Vec<Entry>, &'static str> {
    match collection {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Entry {
                item,
                index,
                key: Value::from(index),
            })
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .enumerate()
            .map(|(index, (key, item))| Entry {
                item,
                index,
                key: Value::String(key),
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(crate::value::kind_name(&other)),
    }
}

/// Identities for a list of entries, with repeated identities made unique
/// by their occurrence count.
pub(crate) fn unique_identities(raw: impl IntoIterator<Item = Value>) -> Vec<String> {
    let mut seen: rustc_hash::FxHashMap<String, usize> = rustc_hash::FxHashMap::default();
    raw.into_iter()
        .map(|value| {
            let base = value.to_string();
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}#{count}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn frame(item: Value, item_as: Option<&str>, index_as: Option<&str>) -> ItemFrame {
        ItemFrame {
            item: Binding::Fixed(item),
            index: Binding::Fixed(json!(1)),
            key: Binding::Fixed(json!("k")),
            item_as: item_as.map(SmolStr::new),
            index_as: index_as.map(SmolStr::new),
        }
    }

    #[test]
    fn test_scope_lookup_innermost_first() {
        let outer = Scope::root().child(frame(json!({"name": "outer", "x": 1}), None, None));
        let inner = outer.child(frame(json!({"name": "inner"}), None, Some("k")));
        assert_eq!(inner.lookup("name"), Some(json!("inner")));
        assert_eq!(inner.lookup("x"), Some(json!(1)));
        assert_eq!(inner.lookup("k"), Some(json!("k")));
        assert_eq!(inner.lookup("@index"), Some(json!(1)));
        assert_eq!(inner.lookup("missing"), None);
    }

    #[test]
    fn test_named_item_does_not_merge() {
        let scope = Scope::root().child(frame(json!({"name": "A"}), Some("item"), None));
        assert_eq!(scope.lookup("name"), None);
        assert_eq!(scope.lookup("item"), Some(json!({"name": "A"})));
        assert_eq!(scope.lookup("this"), Some(json!({"name": "A"})));
    }

    #[test]
    fn test_entries_and_identities() {
        let object = entries(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(object[0].key, json!("b"));
        assert_eq!(object[1].index, 1);
        assert!(entries(json!(null)).unwrap().is_empty());
        assert_eq!(entries(json!(3)).err(), Some("number"));
        assert_eq!(
            unique_identities([json!("a"), json!("b"), json!("a")]),
            vec!["\"a\"", "\"b\"", "\"a\"#2"]
        );
    }
}
