//! Factory registry.
//!
//! [`FactoriesBuilder`] collects [`Factory`] values in any order;
//! [`FactoriesBuilder::build`] validates every kind and returns all duplicate
//! types together rather than stopping at the first. The resulting
//! [`Factories`] is immutable and cheap to clone.
//!
//! Built-in defaults and caller extensions are combined with
//! [`Factories::merge`]: on a type-name collision the extension wins.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{
    AuxiliaryFactory, ComponentKind, Factory, MultiError, SinkFactory, SourceFactory,
    TransformFactory, ValidationError,
};

/// Collects factories before validation.
#[derive(Debug, Clone, Default)]
pub struct FactoriesBuilder {
    factories: Vec<Factory>,
}

impl FactoriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory.
    #[must_use]
    pub fn register(mut self, factory: Factory) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn push(&mut self, factory: Factory) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Validate and index the registered factories.
    ///
    /// # Errors
    /// Returns every duplicate `(kind, type)` pair found, across all kinds.
    pub fn build(self) -> Result<Factories, MultiError> {
        let mut out = Factories::default();
        let mut errors = MultiError::new();

        for factory in self.factories {
            let kind = factory.kind();
            let type_name = factory.type_name();
            let inserted = match factory {
                Factory::Source(f) => insert_unique(&mut out.sources, type_name, f),
                Factory::Transform(f) => insert_unique(&mut out.transforms, type_name, f),
                Factory::Sink(f) => insert_unique(&mut out.sinks, type_name, f),
                Factory::Auxiliary(f) => insert_unique(&mut out.auxiliaries, type_name, f),
            };
            if !inserted {
                errors.push(ValidationError::DuplicateType {
                    kind,
                    type_name: type_name.to_string(),
                });
            }
        }

        errors.into_result().map(|()| out)
    }
}

impl Extend<Factory> for FactoriesBuilder {
    fn extend<I: IntoIterator<Item = Factory>>(&mut self, iter: I) {
        self.factories.extend(iter);
    }
}

impl FromIterator<Factory> for FactoriesBuilder {
    fn from_iter<I: IntoIterator<Item = Factory>>(iter: I) -> Self {
        Self {
            factories: iter.into_iter().collect(),
        }
    }
}

fn insert_unique<F: ?Sized>(
    map: &mut BTreeMap<String, Arc<F>>,
    type_name: &str,
    factory: Arc<F>,
) -> bool {
    match map.entry(type_name.to_string()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(factory);
            true
        }
    }
}

/// Immutable lookup tables, one per kind, keyed by type name.
#[derive(Clone, Default)]
pub struct Factories {
    sources: BTreeMap<String, Arc<dyn SourceFactory>>,
    transforms: BTreeMap<String, Arc<dyn TransformFactory>>,
    sinks: BTreeMap<String, Arc<dyn SinkFactory>>,
    auxiliaries: BTreeMap<String, Arc<dyn AuxiliaryFactory>>,
}

impl Factories {
    /// Validate `defaults` and `extensions` independently, then merge them.
    ///
    /// # Errors
    /// Returns the combined duplicate errors of both sets.
    pub fn compose(
        defaults: FactoriesBuilder,
        extensions: FactoriesBuilder,
    ) -> Result<Self, MultiError> {
        let mut errors = MultiError::new();
        let defaults = defaults.build().unwrap_or_else(|e| {
            errors.extend(e);
            Factories::default()
        });
        let extensions = extensions.build().unwrap_or_else(|e| {
            errors.extend(e);
            Factories::default()
        });
        errors.into_result()?;
        Ok(defaults.merge(extensions))
    }

    /// Combine two tables; entries in `extensions` replace same-named entries
    /// in `self`.
    #[must_use]
    pub fn merge(mut self, extensions: Factories) -> Self {
        merge_kind(&mut self.sources, extensions.sources, ComponentKind::Source);
        merge_kind(
            &mut self.transforms,
            extensions.transforms,
            ComponentKind::Transform,
        );
        merge_kind(&mut self.sinks, extensions.sinks, ComponentKind::Sink);
        merge_kind(
            &mut self.auxiliaries,
            extensions.auxiliaries,
            ComponentKind::Auxiliary,
        );
        self
    }

    pub fn source(&self, type_name: &str) -> Option<&Arc<dyn SourceFactory>> {
        self.sources.get(type_name)
    }

    pub fn transform(&self, type_name: &str) -> Option<&Arc<dyn TransformFactory>> {
        self.transforms.get(type_name)
    }

    pub fn sink(&self, type_name: &str) -> Option<&Arc<dyn SinkFactory>> {
        self.sinks.get(type_name)
    }

    pub fn auxiliary(&self, type_name: &str) -> Option<&Arc<dyn AuxiliaryFactory>> {
        self.auxiliaries.get(type_name)
    }

    /// Whether a factory of `kind` exists for `type_name`.
    pub fn contains(&self, kind: ComponentKind, type_name: &str) -> bool {
        self.default_config(kind, type_name).is_some()
    }

    /// Default settings of the factory for `(kind, type_name)`.
    pub fn default_config(&self, kind: ComponentKind, type_name: &str) -> Option<Value> {
        match kind {
            ComponentKind::Source => self.sources.get(type_name).map(|f| f.default_config()),
            ComponentKind::Transform => self.transforms.get(type_name).map(|f| f.default_config()),
            ComponentKind::Sink => self.sinks.get(type_name).map(|f| f.default_config()),
            ComponentKind::Auxiliary => {
                self.auxiliaries.get(type_name).map(|f| f.default_config())
            }
        }
    }

    /// Number of factories registered for `kind`.
    pub fn len(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Source => self.sources.len(),
            ComponentKind::Transform => self.transforms.len(),
            ComponentKind::Sink => self.sinks.len(),
            ComponentKind::Auxiliary => self.auxiliaries.len(),
        }
    }

    /// Sorted type names registered for `kind`.
    pub fn type_names(&self, kind: ComponentKind) -> Vec<&str> {
        match kind {
            ComponentKind::Source => self.sources.keys().map(String::as_str).collect(),
            ComponentKind::Transform => self.transforms.keys().map(String::as_str).collect(),
            ComponentKind::Sink => self.sinks.keys().map(String::as_str).collect(),
            ComponentKind::Auxiliary => self.auxiliaries.keys().map(String::as_str).collect(),
        }
    }
}

fn merge_kind<F: ?Sized>(
    base: &mut BTreeMap<String, Arc<F>>,
    extensions: BTreeMap<String, Arc<F>>,
    kind: ComponentKind,
) {
    for (type_name, factory) in extensions {
        if base.insert(type_name.clone(), factory).is_some() {
            tracing::debug!(kind = %kind, type_name = %type_name, "Extension factory overrides default");
        }
    }
}

impl std::fmt::Debug for Factories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factories")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .field("auxiliaries", &self.auxiliaries.keys().collect::<Vec<_>>())
            .finish()
    }
}
