//! Template instances.
//!
//! An instance pairs a shared [`TemplateDefinition`] with its own data:
//! settings fixed at creation, reactive [`State`], slot content and recorded
//! evaluation errors. Mounted instances own the nodes between two empty
//! marker text nodes, the reactions that keep them current, their listeners
//! and their child instances.
//!
//! Lifecycle: created → attached → destroyed. The parent link is an id
//! resolved through the runtime's registry, so children never keep their
//! parent alive.

use crate::definition::TemplateDefinition;
use crate::error::{EvalError, RuntimeError};
use crate::eval::{Env, Scope};
use crate::events::bind_events;
use crate::keys::{bind_keys, KeyChord, HISTORY_LIMIT};
use crate::parts::{build, range_nodes, Live, Region};
use crate::program::Fragment;
use crate::render::render_fragment;
use crate::runtime::Runtime;
use crate::state::State;
use crate::value::merge_into;
use dom_query::{Query, QueryOptions};
use dom_tree::{Document, NodeId};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

/// Unique id of a template instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(u64);

impl TemplateId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

/// Where an instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Attached,
    Destroyed,
}

struct Mount {
    document: Document,
    start: NodeId,
    end: NodeId,
    region: Rc<Region>,
}

struct TemplateInner {
    id: TemplateId,
    definition: Rc<TemplateDefinition>,
    runtime: Runtime,
    settings: RefCell<Map<String, Value>>,
    state: State,
    slots: RefCell<FxHashMap<Option<SmolStr>, Rc<Fragment>>>,
    errors: RefCell<Vec<EvalError>>,
    mount: RefCell<Option<Mount>>,
    parent: Cell<Option<TemplateId>>,
    children: RefCell<Vec<Template>>,
    lifecycle: Cell<Lifecycle>,
    key_history: RefCell<Vec<KeyChord>>,
}

/// A template instance. Cloning yields another handle to it.
#[derive(Clone)]
pub struct Template {
    inner: Rc<TemplateInner>,
}

/// A non-owning handle to a [`Template`].
#[derive(Clone)]
pub struct WeakTemplate {
    inner: Weak<TemplateInner>,
}

impl WeakTemplate {
    pub fn upgrade(&self) -> Option<Template> {
        self.inner.upgrade().map(|inner| Template { inner })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("id", &self.inner.id)
            .field("name", self.name())
            .field("lifecycle", &self.inner.lifecycle.get())
            .field("state", &self.inner.state)
            .finish()
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Template {
    pub(crate) fn new(
        id: TemplateId,
        definition: Rc<TemplateDefinition>,
        runtime: Runtime,
        settings: Option<Value>,
    ) -> Self {
        let mut merged = Value::Object(definition.settings().clone());
        if let Some(settings) = &settings {
            merge_into(&mut merged, settings);
        }
        let settings = match merged {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let state = State::from_value(
            runtime.reactor(),
            &Value::Object(definition.default_state().clone()),
        );
        tracing::trace!(template = %definition.name(), %id, "template created");
        Self {
            inner: Rc::new(TemplateInner {
                id,
                definition,
                runtime,
                settings: RefCell::new(settings),
                state,
                slots: RefCell::default(),
                errors: RefCell::default(),
                mount: RefCell::new(None),
                parent: Cell::new(None),
                children: RefCell::default(),
                lifecycle: Cell::new(Lifecycle::Created),
                key_history: RefCell::default(),
            }),
        }
    }

    pub fn id(&self) -> TemplateId {
        self.inner.id
    }

    pub fn name(&self) -> &SmolStr {
        self.inner.definition.name()
    }

    pub fn definition(&self) -> &Rc<TemplateDefinition> {
        &self.inner.definition
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The instance's reactive state.
    pub fn state(&self) -> &State {
        &self.inner.state
    }

    /// The settings this instance was created with.
    pub fn settings(&self) -> Map<String, Value> {
        self.inner.settings.borrow().clone()
    }

    pub fn setting(&self, name: &str) -> Option<Value> {
        self.inner.settings.borrow().get(name).cloned()
    }

    /// Settings with the current state merged over them.
    pub fn data(&self) -> Value {
        let mut data = Value::Object(self.settings());
        merge_into(&mut data, &Value::Object(self.inner.state.snapshot()));
        data
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn downgrade(&self) -> WeakTemplate {
        WeakTemplate {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Evaluation errors recorded so far, oldest first.
    pub fn errors(&self) -> Vec<EvalError> {
        self.inner.errors.borrow().clone()
    }

    pub fn clear_errors(&self) {
        self.inner.errors.borrow_mut().clear();
    }

    /// Logs an evaluation error and keeps it unless it is a repeat or the
    /// instance already holds the maximum.
    pub(crate) fn record_error(&self, error: EvalError) {
        let mut errors = self.inner.errors.borrow_mut();
        if errors.contains(&error) {
            return;
        }
        tracing::warn!(template = %self.name(), id = %self.id(), %error, "evaluation failed");
        if errors.len() < self.inner.runtime.options().max_errors {
            errors.push(error);
        }
    }

    /// Renders the template to markup without touching its data.
    ///
    /// `extra` is visible to expressions above state and settings.
    pub fn render(&self, extra: Option<&Map<String, Value>>) -> String {
        let scope = Scope::root();
        self.inner.runtime.reactor().untrack(|| {
            let env = Env {
                template: self,
                scope: &scope,
                extra,
            };
            let mut out = String::new();
            render_fragment(&env, &self.inner.definition.fragment, &mut out);
            out
        })
    }

    /// Calls one of the template's methods.
    pub fn call(&self, method: &str, args: &[Value]) -> Option<Value> {
        let method = self.inner.definition.method(method)?;
        Some(method(self, args))
    }

    /// Supplies content for a slot; `None` names the default slot. Takes
    /// effect for content rendered afterwards.
    pub fn set_slot(&self, name: Option<&str>, source: &str) -> Result<(), RuntimeError> {
        let ast = self.inner.runtime.cache().get_or_compile(source)?;
        self.inner
            .slots
            .borrow_mut()
            .insert(name.map(SmolStr::new), Fragment::prepare(&ast.nodes));
        Ok(())
    }

    pub(crate) fn slot(&self, name: &Option<SmolStr>) -> Option<Rc<Fragment>> {
        if let Some(slot) = self.inner.slots.borrow().get(name) {
            return Some(slot.clone());
        }
        self.inner.definition.slots.get(name).cloned()
    }

    /// A partial by name: the definition's own partials first, then the
    /// runtime's definitions.
    pub(crate) fn resolve_partial(&self, name: &str) -> Option<Rc<TemplateDefinition>> {
        self.inner
            .definition
            .partial(name)
            .or_else(|| self.inner.runtime.definition(name))
    }

    /// Renders into `root` as its last children and activates the instance:
    /// `on_created` and `on_rendered` run, events and keys are bound and the
    /// instance is registered.
    pub fn attach(
        &self,
        document: &Document,
        root: NodeId,
        parent: Option<&Template>,
    ) -> Result<(), RuntimeError> {
        self.mount_at(document, root, None, parent)?;
        self.inner.runtime.activate_queued();
        Ok(())
    }

    /// Renders and hydrates the template before `before` under `node`,
    /// queueing activation.
    pub(crate) fn mount_at(
        &self,
        document: &Document,
        node: NodeId,
        before: Option<NodeId>,
        parent: Option<&Template>,
    ) -> Result<(), RuntimeError> {
        match self.lifecycle() {
            Lifecycle::Destroyed => {
                return Err(RuntimeError::Destroyed {
                    name: self.name().clone(),
                })
            }
            Lifecycle::Attached => {
                return Err(RuntimeError::AlreadyAttached {
                    name: self.name().clone(),
                })
            }
            Lifecycle::Created if self.inner.mount.borrow().is_some() => {
                return Err(RuntimeError::AlreadyAttached {
                    name: self.name().clone(),
                })
            }
            Lifecycle::Created => {}
        }

        let runtime = self.inner.runtime.clone();
        let live = Live {
            template: self.downgrade(),
            document: document.clone(),
        };
        let region = Region::new();
        let start = document.create_text("");
        let end = document.create_text("");
        let built = runtime.rendering(|| {
            runtime.reactor().untrack(|| {
                build(
                    &live,
                    self,
                    &self.inner.definition.fragment,
                    &Scope::root(),
                    &region,
                )
            })
        });
        let holder = document.create_fragment();
        document.append_child(holder, start)?;
        document.append_child(holder, built)?;
        document.append_child(holder, end)?;
        if let Err(error) = document.insert_before(node, holder, before) {
            for template in region.dispose() {
                template.destroy();
            }
            return Err(error.into());
        }

        *self.inner.mount.borrow_mut() = Some(Mount {
            document: document.clone(),
            start,
            end,
            region,
        });
        if let Some(parent) = parent {
            self.inner.parent.set(Some(parent.id()));
            parent.inner.children.borrow_mut().push(self.clone());
        }
        // Children enqueue during the build above, so they activate first.
        runtime.enqueue(self.clone());
        Ok(())
    }

    pub(crate) fn activate(&self) {
        if self.lifecycle() != Lifecycle::Created || self.inner.mount.borrow().is_none() {
            return;
        }
        self.inner.lifecycle.set(Lifecycle::Attached);
        let hooks = self.inner.definition.hooks.clone();
        for hook in &hooks.created {
            hook(self);
        }
        for hook in &hooks.rendered {
            hook(self);
        }
        bind_events(self);
        bind_keys(self);
        self.inner.runtime.registry().insert(self.clone());
        tracing::debug!(template = %self.name(), id = %self.id(), "template attached");
    }

    /// Tears the instance down: `on_destroyed` runs, reactions are disposed,
    /// listeners removed, children destroyed, rendered nodes removed and the
    /// instance unregistered. Destroying twice is a no-op.
    pub fn destroy(&self) {
        if self.lifecycle() == Lifecycle::Destroyed {
            return;
        }
        let was_attached = self.lifecycle() == Lifecycle::Attached;
        self.inner.lifecycle.set(Lifecycle::Destroyed);
        if was_attached {
            let hooks = self.inner.definition.hooks.destroyed.clone();
            for hook in &hooks {
                hook(self);
            }
        }

        let mount = self.inner.mount.borrow_mut().take();
        if let Some(mount) = &mount {
            let owned = mount.region.dispose();
            mount.document.remove_listeners_by_owner(self.id().get());
            for template in owned {
                template.destroy();
            }
        }
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.destroy();
        }
        if let Some(mount) = &mount {
            for node in range_nodes(&mount.document, mount.start, mount.end) {
                mount.document.remove(node);
            }
        }
        self.inner.key_history.borrow_mut().clear();

        let runtime = &self.inner.runtime;
        runtime.registry().remove(self.id());
        if let Some(parent) = self.inner.parent.get().and_then(|id| runtime.registry().get(id)) {
            parent
                .inner
                .children
                .borrow_mut()
                .retain(|child| child.id() != self.id());
        }
        tracing::debug!(template = %self.name(), id = %self.id(), "template destroyed");
    }

    /// The parent instance, while it is attached.
    pub fn parent(&self) -> Option<Template> {
        let id = self.inner.parent.get()?;
        self.inner.runtime.registry().get(id)
    }

    pub fn children(&self) -> Vec<Template> {
        self.inner.children.borrow().clone()
    }

    /// The nearest ancestor named `name`.
    pub fn find_parent(&self, name: &str) -> Option<Template> {
        let mut current = self.parent();
        while let Some(template) = current {
            if template.name() == name {
                return Some(template);
            }
            current = template.parent();
        }
        None
    }

    /// The first descendant named `name`, depth first.
    pub fn find_child(&self, name: &str) -> Option<Template> {
        for child in self.children() {
            if child.name() == name {
                return Some(child);
            }
            if let Some(found) = child.find_child(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant named `name`, depth first.
    pub fn find_children(&self, name: &str) -> Vec<Template> {
        let mut found = Vec::new();
        for child in self.children() {
            if child.name() == name {
                found.push(child.clone());
            }
            found.extend(child.find_children(name));
        }
        found
    }

    /// An ancestor named `name`, else a descendant.
    pub fn find_template(&self, name: &str) -> Option<Template> {
        self.find_parent(name).or_else(|| self.find_child(name))
    }

    pub fn document(&self) -> Option<Document> {
        self.inner
            .mount
            .borrow()
            .as_ref()
            .map(|mount| mount.document.clone())
    }

    /// The node the template was attached under.
    pub fn container(&self) -> Option<NodeId> {
        let mount = self.inner.mount.borrow();
        let mount = mount.as_ref()?;
        mount.document.parent(mount.start)
    }

    /// The top-level rendered nodes.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mount = self.inner.mount.borrow();
        let Some(mount) = mount.as_ref() else {
            return Vec::new();
        };
        range_nodes(&mount.document, mount.start, mount.end)
            .into_iter()
            .filter(|&node| node != mount.start && node != mount.end)
            .collect()
    }

    /// The current markup of the rendered nodes.
    pub fn html(&self) -> String {
        let Some(document) = self.document() else {
            return String::new();
        };
        self.nodes()
            .into_iter()
            .map(|node| document.outer_html(node))
            .collect()
    }

    /// Whether `node` is one of the rendered nodes or inside one, including
    /// through shadow roots.
    pub fn contains_node(&self, node: NodeId) -> bool {
        let mount = self.inner.mount.borrow();
        let Some(mount) = mount.as_ref() else {
            return false;
        };
        let doc = &mount.document;
        let Some(container) = doc.parent(mount.start) else {
            return false;
        };
        let mut current = node;
        loop {
            match doc.composed_parent(current) {
                Some(parent) if parent == container => break,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        doc.compare_position(mount.start, current) == Ordering::Less
            && doc.compare_position(current, mount.end) == Ordering::Less
    }

    /// Matches `selector` within the rendered nodes, in light DOM.
    pub fn query(&self, selector: &str) -> Result<Query, RuntimeError> {
        self.query_with(selector, false)
    }

    /// Matches `selector` within the rendered nodes and their open shadow
    /// roots.
    pub fn query_deep(&self, selector: &str) -> Result<Query, RuntimeError> {
        self.query_with(selector, true)
    }

    fn query_with(&self, selector: &str, deep: bool) -> Result<Query, RuntimeError> {
        let (Some(document), Some(container)) = (self.document(), self.container()) else {
            return Err(RuntimeError::NotAttached {
                name: self.name().clone(),
            });
        };
        let options = QueryOptions {
            root: Some(container),
            pierce_shadow: deep,
        };
        let query = Query::select_with(&document, selector, options)?;
        Ok(query.filter_by(|_, node| self.contains_node(node)))
    }

    /// Records a key press and returns the recent history.
    pub(crate) fn push_key(&self, chord: KeyChord) -> Vec<KeyChord> {
        let mut history = self.inner.key_history.borrow_mut();
        history.push(chord);
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
        history.clone()
    }

    pub(crate) fn clear_keys(&self) {
        self.inner.key_history.borrow_mut().clear();
    }

    /// Live reactions owned by the rendered parts.
    pub fn part_count(&self) -> usize {
        self.inner
            .mount
            .borrow()
            .as_ref()
            .map_or(0, |mount| mount.region.reaction_count())
    }
}
