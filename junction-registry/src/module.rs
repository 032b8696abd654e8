//! Handler modules and the catalog they are selected from.
//!
//! A module is a named, static list of handlers. It registers them through a
//! [`ModuleRegistrar`] when the registry is loaded. Which modules load is
//! decided by the configured list of identifiers, looked up in a
//! [`ModuleCatalog`] built at compile time by the application.

use crate::descriptor::HandlerDescriptor;
use crate::error::LoadError;
use junction_types::{Criterion, Processor};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A named group of handlers registered together.
pub trait HandlerModule: Send + Sync {
    /// Identifier the configuration refers to this module by.
    fn name(&self) -> &str;

    /// Register every handler of this module.
    ///
    /// Returning an error discards whatever this call already registered.
    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), LoadError>;
}

/// Collects the handlers one module registers.
pub struct ModuleRegistrar {
    module: String,
    entries: Vec<HandlerDescriptor>,
}

impl ModuleRegistrar {
    pub(crate) fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entries: Vec::new(),
        }
    }

    /// Identifier of the module being registered.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Register a processor.
    pub fn processor(&mut self, name: impl Into<String>, processor: impl Processor + 'static) {
        self.add(HandlerDescriptor::processor(name, Arc::new(processor)));
    }

    /// Register a criterion.
    pub fn criterion(&mut self, name: impl Into<String>, criterion: impl Criterion + 'static) {
        self.add(HandlerDescriptor::criterion(name, Arc::new(criterion)));
    }

    /// Register a processor with its own timeout.
    pub fn processor_with_timeout(
        &mut self,
        name: impl Into<String>,
        processor: impl Processor + 'static,
        timeout: Duration,
    ) {
        self.add(HandlerDescriptor::processor(name, Arc::new(processor)).with_timeout(timeout));
    }

    /// Register a pre-built descriptor.
    pub fn add(&mut self, descriptor: HandlerDescriptor) {
        self.entries.push(descriptor);
    }

    pub(crate) fn into_entries(self) -> Vec<HandlerDescriptor> {
        self.entries
    }
}

/// A module defined by a registration function.
pub struct FnModule<F> {
    name: String,
    register: F,
}

impl<F> FnModule<F>
where
    F: Fn(&mut ModuleRegistrar) -> Result<(), LoadError> + Send + Sync,
{
    /// Create a module named `name` whose handlers `register` adds.
    pub fn new(name: impl Into<String>, register: F) -> Self {
        Self {
            name: name.into(),
            register,
        }
    }
}

impl<F> HandlerModule for FnModule<F>
where
    F: Fn(&mut ModuleRegistrar) -> Result<(), LoadError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), LoadError> {
        (self.register)(registrar)
    }
}

/// Every module the application was built with, by identifier.
#[derive(Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, Arc<dyn HandlerModule>>,
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module (builder style).
    pub fn with_module(mut self, module: impl HandlerModule + 'static) -> Self {
        self.add(Arc::new(module));
        self
    }

    /// Add a module. A later module with the same identifier replaces the
    /// earlier one.
    pub fn add(&mut self, module: Arc<dyn HandlerModule>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Look up a module by identifier.
    pub fn get(&self, name: &str) -> Option<Arc<dyn HandlerModule>> {
        self.modules.get(name).cloned()
    }

    /// Identifiers of every module in the catalog, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }
}
