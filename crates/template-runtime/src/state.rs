//! Reactive template state.
//!
//! Each top-level key is its own [`Signal`], so a part that reads `count`
//! does not re-run when `items` changes. Reads of missing keys subscribe to
//! the key set instead, so adding the key later still reaches them.

use crate::value::{self, as_number, get_path, truthy};
use indexmap::IndexMap;
use reactive::{Reactor, Signal};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct StateInner {
    reactor: Reactor,
    values: RefCell<IndexMap<SmolStr, Signal<Value>>>,
    /// Bumped whenever a key is added or removed.
    shape: Signal<u64>,
}

/// The reactive data owned by one template instance.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct State {
    inner: Rc<StateInner>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

impl State {
    /// Creates an empty state.
    pub fn new(reactor: &Reactor) -> Self {
        Self {
            inner: Rc::new(StateInner {
                reactor: reactor.clone(),
                values: RefCell::new(IndexMap::new()),
                shape: reactor.signal(0),
            }),
        }
    }

    /// Creates a state holding the keys of `initial` (ignored unless it is an
    /// object).
    pub fn from_value(reactor: &Reactor, initial: &Value) -> Self {
        let state = Self::new(reactor);
        if let Value::Object(map) = initial {
            let mut values = state.inner.values.borrow_mut();
            for (key, value) in map {
                values.insert(SmolStr::new(key), reactor.signal(value.clone()));
            }
        }
        state
    }

    fn signal_of(&self, key: &str) -> Option<Signal<Value>> {
        self.inner.values.borrow().get(key).cloned()
    }

    /// The signal behind `key`, created with `null` if missing.
    pub fn signal(&self, key: &str) -> Signal<Value> {
        if let Some(signal) = self.signal_of(key) {
            return signal;
        }
        let signal = self.inner.reactor.signal(Value::Null);
        self.inner
            .values
            .borrow_mut()
            .insert(SmolStr::new(key), signal.clone());
        self.bump_shape();
        signal
    }

    fn bump_shape(&self) {
        let next = self.inner.shape.peek().wrapping_add(1);
        self.inner.shape.set(next);
    }

    /// The value of `key`, recording the read. Missing keys are `null`.
    pub fn get(&self, key: &str) -> Value {
        self.lookup(key).unwrap_or(Value::Null)
    }

    /// Like [`State::get`] but distinguishes missing keys.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self.signal_of(key) {
            Some(signal) => Some(signal.get()),
            None => {
                self.inner.shape.get();
                None
            }
        }
    }

    /// The value of `key` without recording the read.
    pub fn peek(&self, key: &str) -> Value {
        self.signal_of(key).map_or(Value::Null, |s| s.peek())
    }

    /// Whether `key` exists, recording the read.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.shape.get();
        self.inner.values.borrow().contains_key(key)
    }

    /// Follows a dotted path such as `user.address.city` or `items.0`.
    pub fn get_path(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let Some(root) = segments.next() else {
            return Value::Null;
        };
        get_path(self.get(root), segments)
    }

    /// Sets `key`. Setting an equal value notifies nobody.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.signal_of(key) {
            Some(signal) => signal.set(value),
            None => {
                self.inner
                    .values
                    .borrow_mut()
                    .insert(SmolStr::new(key), self.inner.reactor.signal(value));
                self.bump_shape();
            }
        }
    }

    /// Sets every key of an object.
    pub fn set_all(&self, values: &Value) {
        if let Value::Object(map) = values {
            for (key, value) in map {
                self.set(key, value.clone());
            }
        }
    }

    /// Mutates `key` in place and notifies its readers.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut Value)) {
        self.signal(key).update(f);
    }

    /// Writes `value` at a dotted path, creating intermediate objects.
    /// Returns `false` (and changes nothing) when the path runs into a
    /// scalar.
    pub fn set_path(&self, path: &str, new: impl Into<Value>) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((root, rest)) = segments.split_first() else {
            return false;
        };
        let mut current = self.peek(root);
        if !value::set_path(&mut current, rest, new.into()) {
            return false;
        }
        self.set(root, current);
        true
    }

    /// Appends to the array at `key`. A missing or `null` key becomes an
    /// array.
    pub fn push(&self, key: &str, item: impl Into<Value>) {
        let item = item.into();
        self.update(key, |value| {
            if value.is_null() {
                *value = Value::Array(Vec::new());
            }
            if let Value::Array(items) = value {
                items.push(item);
            }
        });
    }

    /// Removes and returns the array element at `index`.
    pub fn remove_at(&self, key: &str, index: usize) -> Option<Value> {
        let mut items = match self.peek(key) {
            Value::Array(items) if index < items.len() => items,
            _ => return None,
        };
        let removed = items.remove(index);
        self.set(key, Value::Array(items));
        Some(removed)
    }

    /// Flips the truthiness of `key` and returns the new value.
    pub fn toggle(&self, key: &str) -> bool {
        let next = !truthy(&self.peek(key));
        self.set(key, next);
        next
    }

    /// Adds `by` to the number at `key` (missing counts as zero) and returns
    /// the result.
    pub fn increment(&self, key: &str, by: f64) -> f64 {
        let next = as_number(&self.peek(key)).unwrap_or(0.0) + by;
        self.set(key, value::number(next));
        next
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let signal = self.inner.values.borrow_mut().shift_remove(key)?;
        let value = signal.peek();
        signal.set(Value::Null);
        self.bump_shape();
        Some(value)
    }

    /// The keys in insertion order.
    pub fn keys(&self) -> Vec<SmolStr> {
        self.inner.values.borrow().keys().cloned().collect()
    }

    /// A copy of every key and value, without recording reads.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner
            .values
            .borrow()
            .iter()
            .map(|(k, s)| (k.to_string(), s.peek()))
            .collect()
    }
}
