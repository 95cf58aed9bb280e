//! Template definitions and their builder.

use crate::error::RuntimeError;
use crate::events::{EventArgs, EventBinding};
use crate::keys::{KeyArgs, KeyBinding};
use crate::program::Fragment;
use crate::runtime::Runtime;
use crate::template::Template;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use template_compiler::{Ast, CacheKey};

/// A template method, callable from expressions and from Rust.
pub type Method = Rc<dyn Fn(&Template, &[Value]) -> Value>;

/// Handles a delegated or bound event.
pub type EventHandler = Rc<dyn Fn(&mut EventArgs<'_>)>;

/// Handles a key binding. Returning `Some(false)` prevents the default
/// action.
pub type KeyHandler = Rc<dyn Fn(&mut KeyArgs<'_>) -> Option<bool>>;

/// A lifecycle callback.
pub type Hook = Rc<dyn Fn(&Template)>;

#[derive(Default, Clone)]
pub(crate) struct Hooks {
    pub(crate) created: Vec<Hook>,
    pub(crate) rendered: Vec<Hook>,
    pub(crate) destroyed: Vec<Hook>,
}

/// Everything instances of one template share: the compiled AST, default
/// data, methods, event and key maps, partials and default slot content.
pub struct TemplateDefinition {
    name: SmolStr,
    ast: Arc<Ast>,
    pub(crate) fragment: Rc<Fragment>,
    settings: Map<String, Value>,
    state: Map<String, Value>,
    methods: FxHashMap<SmolStr, Method>,
    pub(crate) events: Vec<(EventBinding, EventHandler)>,
    pub(crate) keys: Vec<(KeyBinding, KeyHandler)>,
    partials: FxHashMap<SmolStr, Rc<TemplateDefinition>>,
    pub(crate) slots: FxHashMap<Option<SmolStr>, Rc<Fragment>>,
    pub(crate) hooks: Hooks,
}

impl fmt::Debug for TemplateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDefinition")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("events", &self.events.len())
            .field("keys", &self.keys.len())
            .field("partials", &self.partials.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateDefinition {
    /// The template's name.
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The compiled template.
    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    /// Default settings, overridden per instance.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Initial reactive state of every instance.
    pub fn default_state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Looks up a method.
    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }

    /// Names of the defined methods.
    pub fn method_names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up a locally registered partial.
    pub fn partial(&self, name: &str) -> Option<Rc<TemplateDefinition>> {
        self.partials.get(name).cloned()
    }

    /// The event map, as parsed bindings.
    pub fn event_bindings(&self) -> impl Iterator<Item = &EventBinding> {
        self.events.iter().map(|(binding, _)| binding)
    }

    /// The key map, as parsed bindings.
    pub fn key_bindings(&self) -> impl Iterator<Item = &KeyBinding> {
        self.keys.iter().map(|(binding, _)| binding)
    }
}

enum Source {
    Text(String),
    Ast(Arc<Ast>),
}

/// Builds a [`TemplateDefinition`].
///
/// ```
/// use serde_json::json;
/// use template_runtime::{Runtime, TemplateBuilder};
///
/// let runtime = Runtime::new();
/// let greeting = runtime
///     .define(
///         TemplateBuilder::new("greeting")
///             .source("<p>{greet name}</p>")
///             .state(json!({"name": "Ada"}))
///             .method("greet", |_, args| json!(format!("Hello, {}", args[0].as_str().unwrap_or(""))))
///     )
///     .unwrap();
/// let template = runtime.create(&greeting, None);
/// assert_eq!(template.render(None), "<p>Hello, Ada</p>");
/// ```
pub struct TemplateBuilder {
    name: SmolStr,
    source: Option<Source>,
    settings: Map<String, Value>,
    state: Map<String, Value>,
    methods: FxHashMap<SmolStr, Method>,
    events: Vec<(String, EventHandler)>,
    keys: Vec<(String, KeyHandler)>,
    partials: FxHashMap<SmolStr, Rc<TemplateDefinition>>,
    slots: Vec<(Option<SmolStr>, String)>,
    hooks: Hooks,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl TemplateBuilder {
    /// Starts a definition named `name`.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            source: None,
            settings: Map::new(),
            state: Map::new(),
            methods: FxHashMap::default(),
            events: Vec::new(),
            keys: Vec::new(),
            partials: FxHashMap::default(),
            slots: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Template source, compiled through the runtime's cache.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(Source::Text(source.into()));
        self
    }

    /// An already compiled AST.
    pub fn ast(mut self, ast: Arc<Ast>) -> Self {
        self.source = Some(Source::Ast(ast));
        self
    }

    /// Default settings. Non-object values are ignored.
    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = object(settings);
        self
    }

    /// Initial reactive state. Non-object values are ignored.
    pub fn state(mut self, state: Value) -> Self {
        self.state = object(state);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<SmolStr>,
        method: impl Fn(&Template, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Adds an event map entry such as `"click .save"`,
    /// `"deep input, change input"` or `"global resize"`.
    pub fn event(
        mut self,
        binding: impl Into<String>,
        handler: impl Fn(&mut EventArgs<'_>) + 'static,
    ) -> Self {
        self.events.push((binding.into(), Rc::new(handler)));
        self
    }

    /// Adds a key map entry such as `"ctrl+s"` or `"g g, shift+?"`.
    pub fn key(
        mut self,
        binding: impl Into<String>,
        handler: impl Fn(&mut KeyArgs<'_>) -> Option<bool> + 'static,
    ) -> Self {
        self.keys.push((binding.into(), Rc::new(handler)));
        self
    }

    /// Registers a partial visible only to this template.
    pub fn partial(mut self, definition: Rc<TemplateDefinition>) -> Self {
        self.partials.insert(definition.name().clone(), definition);
        self
    }

    /// Default content for a slot; `None` names the default slot.
    pub fn slot(mut self, name: Option<&str>, source: impl Into<String>) -> Self {
        self.slots.push((name.map(SmolStr::new), source.into()));
        self
    }

    pub fn on_created(mut self, hook: impl Fn(&Template) + 'static) -> Self {
        self.hooks.created.push(Rc::new(hook));
        self
    }

    pub fn on_rendered(mut self, hook: impl Fn(&Template) + 'static) -> Self {
        self.hooks.rendered.push(Rc::new(hook));
        self
    }

    pub fn on_destroyed(mut self, hook: impl Fn(&Template) + 'static) -> Self {
        self.hooks.destroyed.push(Rc::new(hook));
        self
    }

    /// Compiles the source and parses the event and key maps.
    pub fn build(self, runtime: &Runtime) -> Result<Rc<TemplateDefinition>, RuntimeError> {
        let ast = match self.source {
            Some(Source::Ast(ast)) => ast,
            Some(Source::Text(text)) => runtime.cache().get_or_compile(&text)?,
            None => runtime
                .cache()
                .get_or_compile_keyed(CacheKey::named(format!("empty:{}", self.name)), "")?,
        };
        let fragment = Fragment::prepare(&ast.nodes);

        let events = self
            .events
            .into_iter()
            .map(|(spec, handler)| Ok((EventBinding::parse(&spec)?, handler)))
            .collect::<Result<Vec<_>, RuntimeError>>()?;
        let keys = self
            .keys
            .into_iter()
            .map(|(spec, handler)| Ok((KeyBinding::parse(&spec)?, handler)))
            .collect::<Result<Vec<_>, RuntimeError>>()?;

        let mut slots = FxHashMap::default();
        for (name, source) in self.slots {
            let slot_ast = runtime.cache().get_or_compile(&source)?;
            slots.insert(name, Fragment::prepare(&slot_ast.nodes));
        }

        tracing::debug!(template = %self.name, "template defined");
        Ok(Rc::new(TemplateDefinition {
            name: self.name,
            ast,
            fragment,
            settings: self.settings,
            state: self.state,
            methods: self.methods,
            events,
            keys,
            partials: self.partials,
            slots,
            hooks: self.hooks,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventScope;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_parses_maps() {
        let runtime = Runtime::new();
        let definition = TemplateBuilder::new("list")
            .source("<ul></ul>")
            .settings(json!({"title": "x"}))
            .event("deep click, keyup li", |_| {})
            .key("ctrl+s", |_| Some(false))
            .method("b", |_, _| Value::Null)
            .method("a", |_, _| Value::Null)
            .build(&runtime)
            .unwrap();
        let bindings: Vec<_> = definition.event_bindings().collect();
        assert_eq!(bindings[0].scope, EventScope::Deep);
        assert_eq!(bindings[0].types, vec!["click", "keyup"]);
        assert_eq!(definition.key_bindings().count(), 1);
        assert_eq!(definition.method_names(), vec!["a", "b"]);
        assert_eq!(definition.settings().get("title"), Some(&json!("x")));
    }

    #[test]
    fn test_build_rejects_bad_bindings() {
        let runtime = Runtime::new();
        let result = TemplateBuilder::new("bad")
            .event("click [x", |_| {})
            .build(&runtime);
        assert!(matches!(result, Err(RuntimeError::Selector(_))));

        let result = TemplateBuilder::new("bad").key("ctrl+", |_| None).build(&runtime);
        assert!(matches!(result, Err(RuntimeError::InvalidKeyBinding { .. })));

        let result = TemplateBuilder::new("bad").source("{#if a}").build(&runtime);
        assert!(matches!(result, Err(RuntimeError::Compile(_))));
    }
}
