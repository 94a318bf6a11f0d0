//! Class-definition resolution via an explicit factory registry.
//!
//! The eager loading path names a module file; the registry maps that
//! module's name to the model classes it exports. Resolution requires
//! exactly one class per module — no reflection, no scanning.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::HandlerError;

use super::module::Module;

type Constructor = fn() -> Box<dyn Module>;

/// A model class exported by a module: a name and a zero-argument
/// constructor producing an unrestored instance.
#[derive(Clone, Copy)]
pub struct ModelClass {
    pub name: &'static str,
    pub construct: Constructor,
}

impl std::fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClass").field("name", &self.name).finish()
    }
}

/// Registry of model classes keyed by module name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<String, Vec<ModelClass>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model class under a module name.
    pub fn register(&self, module: &str, class: ModelClass) {
        self.modules
            .write()
            .entry(module.to_string())
            .or_default()
            .push(class);
    }

    /// Resolve the single model class exported by `module`.
    ///
    /// Zero candidates and multiple candidates are both
    /// `AmbiguousModelDefinition`: the loading path cannot pick for you.
    pub fn resolve(&self, module: &str) -> Result<ModelClass, HandlerError> {
        let modules = self.modules.read();
        let classes = modules.get(module).map(Vec::as_slice).unwrap_or(&[]);
        match classes {
            [class] => Ok(*class),
            other => Err(HandlerError::AmbiguousModelDefinition {
                module: module.to_string(),
                found: other.len(),
            }),
        }
    }

    /// Resolve and construct in one step.
    pub fn instantiate(&self, module: &str) -> Result<Box<dyn Module>, HandlerError> {
        let class = self.resolve(module)?;
        Ok((class.construct)())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }
}
