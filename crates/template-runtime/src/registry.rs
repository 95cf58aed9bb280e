//! The registry of attached template instances.

use crate::template::{Template, TemplateId};
use indexmap::IndexMap;
use std::cell::RefCell;

/// Attached instances in attachment order.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RefCell<IndexMap<TemplateId, Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, template: Template) {
        self.templates.borrow_mut().insert(template.id(), template);
    }

    pub(crate) fn remove(&self, id: TemplateId) -> Option<Template> {
        self.templates.borrow_mut().shift_remove(&id)
    }

    pub fn get(&self, id: TemplateId) -> Option<Template> {
        self.templates.borrow().get(&id).cloned()
    }

    /// The first attached instance named `name`.
    pub fn find(&self, name: &str) -> Option<Template> {
        self.templates
            .borrow()
            .values()
            .find(|template| template.name() == name)
            .cloned()
    }

    /// Every attached instance named `name`.
    pub fn find_all(&self, name: &str) -> Vec<Template> {
        self.templates
            .borrow()
            .values()
            .filter(|template| template.name() == name)
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> Vec<TemplateId> {
        self.templates.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.borrow().is_empty()
    }
}
