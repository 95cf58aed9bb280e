//! Compiled AST cache.
//!
//! Compilation is deterministic, so an AST can be shared by every template
//! instance built from the same text. Entries are keyed by the `blake3` hash
//! of the source, or by an explicit key chosen by the caller.

use crate::ast::Ast;
use crate::error::CompileError;
use crate::{compile_with_options, CompileOptions};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

/// Identifies a cached AST.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Hash of the template source.
    Source(blake3::Hash),
    /// Caller-chosen key, typically a template name.
    Named(String),
}

impl CacheKey {
    /// Key derived from the source text.
    pub fn for_source(source: &str) -> Self {
        CacheKey::Source(blake3::hash(source.as_bytes()))
    }

    /// Explicit key.
    pub fn named(name: impl Into<String>) -> Self {
        CacheKey::Named(name.into())
    }
}

/// A thread-safe map from [`CacheKey`] to compiled ASTs.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<FxHashMap<CacheKey, Arc<Ast>>>,
    options: CompileOptions,
}

impl TemplateCache {
    /// Creates an empty cache using default compile options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache that compiles with `options`.
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            entries: Mutex::default(),
            options,
        }
    }

    /// Returns the AST for `source`, compiling it on first use.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Ast>, CompileError> {
        self.get_or_compile_keyed(CacheKey::for_source(source), source)
    }

    /// Returns the AST stored under `key`, compiling `source` if absent.
    ///
    /// Failed compilations are not cached.
    pub fn get_or_compile_keyed(
        &self,
        key: CacheKey,
        source: &str,
    ) -> Result<Arc<Ast>, CompileError> {
        if let Some(ast) = self.get(&key) {
            return Ok(ast);
        }
        let ast = Arc::new(compile_with_options(source, self.options.clone())?);
        let mut entries = self.lock();
        Ok(entries.entry(key).or_insert(ast).clone())
    }

    /// Looks up a cached AST.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Ast>> {
        self.lock().get(key).cloned()
    }

    /// Removes an entry, returning it.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<Ast>> {
        self.lock().remove(key)
    }

    /// Number of cached ASTs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<CacheKey, Arc<Ast>>> {
        // A poisoned map still holds fully inserted entries.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_shares_ast() {
        let cache = TemplateCache::new();
        let a = cache.get_or_compile("<p>{name}</p>").unwrap();
        let b = cache.get_or_compile("<p>{name}</p>").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_named_key() {
        let cache = TemplateCache::new();
        let key = CacheKey::named("greeting");
        let a = cache.get_or_compile_keyed(key.clone(), "Hi {name}").unwrap();
        let b = cache.get_or_compile_keyed(key.clone(), "ignored").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.remove(&key).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = TemplateCache::new();
        assert!(cache.get_or_compile("{#if a}").is_err());
        assert!(cache.is_empty());
    }
}
