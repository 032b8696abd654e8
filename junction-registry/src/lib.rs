#![deny(missing_docs)]
//! Handler registry for junction.
//!
//! The [`HandlerRegistry`] indexes processors and criteria by name, one
//! namespace per [`HandlerKind`]. It is built once at startup, either from
//! configured [`HandlerModule`]s looked up in a [`ModuleCatalog`] or directly
//! through a [`RegistryBuilder`], and is read-only afterwards. Share it as
//! `Arc<HandlerRegistry>`; lookups need no locking.
//!
//! Startup rules:
//! - a module that is missing from the catalog or fails to register is
//!   logged and skipped;
//! - two handlers of one kind under one name abort loading;
//! - a registry that ends up empty aborts loading.

mod descriptor;
mod error;
mod module;

pub use descriptor::{HandlerDescriptor, HandlerRef};
pub use error::{LoadError, RegistryError};
pub use module::{FnModule, HandlerModule, ModuleCatalog, ModuleRegistrar};

use junction_types::{Criterion, HandlerKind, Processor};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Frozen index of handlers by kind and name.
pub struct HandlerRegistry {
    processors: HashMap<String, HandlerDescriptor>,
    criteria: HashMap<String, HandlerDescriptor>,
    skipped: Vec<LoadError>,
}

impl HandlerRegistry {
    /// Start building a registry by direct registration.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Load the configured modules from `catalog`.
    ///
    /// Modules are loaded in the order given; a repeated identifier is
    /// loaded once. Load failures are collected in
    /// [`skipped`](Self::skipped).
    pub fn load<S: AsRef<str>>(
        catalog: &ModuleCatalog,
        modules: &[S],
    ) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        let mut seen = HashSet::new();

        for id in modules.iter().map(AsRef::as_ref) {
            if !seen.insert(id) {
                tracing::debug!(module = id, "handler module listed twice, loading once");
                continue;
            }

            let Some(module) = catalog.get(id) else {
                let err = LoadError::new(id, "not present in the module catalog");
                tracing::warn!(module = id, error = %err, "skipping handler module");
                builder.skipped.push(err);
                continue;
            };

            let mut registrar = ModuleRegistrar::new(id);
            match module.register(&mut registrar) {
                Ok(()) => {
                    let entries = registrar.into_entries();
                    tracing::info!(module = id, handlers = entries.len(), "loaded handler module");
                    for descriptor in entries {
                        builder.insert(descriptor)?;
                    }
                }
                Err(err) => {
                    tracing::warn!(module = id, error = %err, "skipping handler module");
                    builder.skipped.push(err);
                }
            }
        }

        builder.build()
    }

    /// Resolve a handler.
    pub fn lookup(&self, kind: HandlerKind, name: &str) -> Result<&HandlerDescriptor, RegistryError> {
        self.table(kind)
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    /// Registered names of one kind, sorted.
    pub fn names(&self, kind: HandlerKind) -> Vec<&str> {
        let mut names: Vec<&str> = self.table(kind).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Total number of handlers.
    pub fn len(&self) -> usize {
        self.processors.len() + self.criteria.len()
    }

    /// True if no handler is registered. Never true for a loaded registry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Modules that failed to load.
    pub fn skipped(&self) -> &[LoadError] {
        &self.skipped
    }

    fn table(&self, kind: HandlerKind) -> &HashMap<String, HandlerDescriptor> {
        match kind {
            HandlerKind::Processor => &self.processors,
            HandlerKind::Criterion => &self.criteria,
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("processors", &self.names(HandlerKind::Processor))
            .field("criteria", &self.names(HandlerKind::Criterion))
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Builds a [`HandlerRegistry`] by direct registration.
///
/// The first name conflict is remembered and returned by
/// [`build`](Self::build), so registrations can be chained.
#[derive(Default)]
pub struct RegistryBuilder {
    processors: HashMap<String, HandlerDescriptor>,
    criteria: HashMap<String, HandlerDescriptor>,
    skipped: Vec<LoadError>,
    conflict: Option<RegistryError>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor.
    pub fn processor(self, name: impl Into<String>, processor: impl Processor + 'static) -> Self {
        self.descriptor(HandlerDescriptor::processor(name, Arc::new(processor)))
    }

    /// Register a processor with its own timeout.
    pub fn processor_with_timeout(
        self,
        name: impl Into<String>,
        processor: impl Processor + 'static,
        timeout: Duration,
    ) -> Self {
        self.descriptor(HandlerDescriptor::processor(name, Arc::new(processor)).with_timeout(timeout))
    }

    /// Register a criterion.
    pub fn criterion(self, name: impl Into<String>, criterion: impl Criterion + 'static) -> Self {
        self.descriptor(HandlerDescriptor::criterion(name, Arc::new(criterion)))
    }

    /// Register a pre-built descriptor.
    pub fn descriptor(mut self, descriptor: HandlerDescriptor) -> Self {
        if self.conflict.is_none() {
            if let Err(err) = self.insert(descriptor) {
                self.conflict = Some(err);
            }
        }
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        if let Some(err) = self.conflict {
            return Err(err);
        }
        if self.processors.is_empty() && self.criteria.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(HandlerRegistry {
            processors: self.processors,
            criteria: self.criteria,
            skipped: self.skipped,
        })
    }

    fn insert(&mut self, descriptor: HandlerDescriptor) -> Result<(), RegistryError> {
        let kind = descriptor.kind();
        let table = match kind {
            HandlerKind::Processor => &mut self.processors,
            HandlerKind::Criterion => &mut self.criteria,
        };
        match table.entry(descriptor.name().to_string()) {
            Entry::Occupied(slot) => {
                tracing::error!(kind = %kind, name = slot.key().as_str(), "duplicate handler name");
                Err(RegistryError::DuplicateName {
                    kind,
                    name: slot.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(descriptor);
                Ok(())
            }
        }
    }
}
