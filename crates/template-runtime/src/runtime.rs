//! The runtime service shared by every template instance.

use crate::definition::{TemplateBuilder, TemplateDefinition};
use crate::error::RuntimeError;
use crate::helpers::HelperRegistry;
use crate::registry::TemplateRegistry;
use crate::template::{Template, TemplateId};
use reactive::Reactor;
use rustc_hash::FxHashMap;
use serde_json::Value;
use smol_str::SmolStr;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use template_compiler::{CompileOptions, TemplateCache};

/// Options for a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Options for templates compiled by this runtime.
    pub compile: CompileOptions,
    /// Evaluation errors kept per instance.
    pub max_errors: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            compile: CompileOptions::default(),
            max_errors: 100,
        }
    }
}

struct RuntimeInner {
    reactor: Reactor,
    registry: TemplateRegistry,
    helpers: Arc<HelperRegistry>,
    cache: Arc<TemplateCache>,
    definitions: RefCell<FxHashMap<SmolStr, Rc<TemplateDefinition>>>,
    options: RuntimeOptions,
    next_id: Cell<u64>,
    /// Mounted instances waiting for their created/rendered hooks.
    queue: RefCell<Vec<Template>>,
    render_depth: Cell<usize>,
}

/// Bundles the reactor, the instance registry, helpers and the AST cache.
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("templates", &self.inner.registry.len())
            .field("definitions", &self.inner.definitions.borrow().len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Runtime {
    /// A runtime with a fresh reactor, the built-in helpers and an empty
    /// cache.
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let cache = Arc::new(TemplateCache::with_options(options.compile.clone()));
        Self::with_services(
            Reactor::new(),
            Arc::new(HelperRegistry::builtin()),
            cache,
            options,
        )
    }

    /// A runtime over existing services, e.g. a reactor shared with other
    /// state or a cache shared between runtimes.
    pub fn with_services(
        reactor: Reactor,
        helpers: Arc<HelperRegistry>,
        cache: Arc<TemplateCache>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                reactor,
                registry: TemplateRegistry::new(),
                helpers,
                cache,
                definitions: RefCell::default(),
                options,
                next_id: Cell::new(0),
                queue: RefCell::default(),
                render_depth: Cell::new(0),
            }),
        }
    }

    pub fn reactor(&self) -> &Reactor {
        &self.inner.reactor
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.inner.helpers
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.inner.cache
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.inner.registry
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }

    /// Builds a definition and makes it available as a partial by name.
    pub fn define(&self, builder: TemplateBuilder) -> Result<Rc<TemplateDefinition>, RuntimeError> {
        let definition = builder.build(self)?;
        self.inner
            .definitions
            .borrow_mut()
            .insert(definition.name().clone(), definition.clone());
        Ok(definition)
    }

    /// A definition registered with [`Runtime::define`].
    pub fn definition(&self, name: &str) -> Option<Rc<TemplateDefinition>> {
        self.inner.definitions.borrow().get(name).cloned()
    }

    /// Names of the registered definitions, sorted.
    pub fn definition_names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self.inner.definitions.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates an instance. `settings` is merged over the definition's
    /// default settings.
    pub fn create(&self, definition: &Rc<TemplateDefinition>, settings: Option<Value>) -> Template {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        Template::new(TemplateId::new(id), definition.clone(), self.clone(), settings)
    }

    /// Runs pending reactions.
    pub fn flush(&self) {
        self.inner.reactor.flush();
    }

    /// Runs `f`, then flushes once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.reactor.batch(f)
    }

    /// The first attached instance named `name`.
    pub fn find_template(&self, name: &str) -> Option<Template> {
        self.inner.registry.find(name)
    }

    /// Every attached instance named `name`.
    pub fn find_templates(&self, name: &str) -> Vec<Template> {
        self.inner.registry.find_all(name)
    }

    /// Runs `f` as part of a render pass; instances mounted meanwhile are
    /// activated when the outermost pass ends and
    /// [`Runtime::activate_queued`] runs.
    pub(crate) fn rendering<R>(&self, f: impl FnOnce() -> R) -> R {
        let depth = &self.inner.render_depth;
        depth.set(depth.get() + 1);
        let _guard = DepthGuard(depth);
        f()
    }

    pub(crate) fn enqueue(&self, template: Template) {
        self.inner.queue.borrow_mut().push(template);
    }

    /// Activates every mounted instance, unless a render pass is running.
    pub(crate) fn activate_queued(&self) {
        if self.inner.render_depth.get() > 0 {
            return;
        }
        loop {
            let queued = std::mem::take(&mut *self.inner.queue.borrow_mut());
            if queued.is_empty() {
                break;
            }
            for template in queued {
                template.activate();
            }
        }
    }
}
