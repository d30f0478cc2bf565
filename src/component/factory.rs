//! Factory traits and the tagged [`Factory`] constructor.
//!
//! Component settings are carried as `serde_json::Value` until they reach
//! the factory, which decodes them into its own typed config with
//! [`decode_config`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::component::{
    Component, ComponentError, ComponentId, ComponentKind, MetricsSink, MetricsTransform,
};
use crate::consumer::MetricsConsumer;
use crate::obsreport::ReceiverMetrics;

/// Per-instance context handed to factories.
#[derive(Debug, Clone)]
pub struct CreateSettings {
    /// Instance being created.
    pub id: ComponentId,
    /// Shared self-observability counters.
    pub receiver_metrics: Arc<ReceiverMetrics>,
}

impl CreateSettings {
    pub fn new(id: ComponentId, receiver_metrics: Arc<ReceiverMetrics>) -> Self {
        Self {
            id,
            receiver_metrics,
        }
    }
}

/// Behaviour common to every factory.
pub trait ComponentFactory: Send + Sync + 'static {
    /// Type name, unique within the factory's kind.
    fn type_name(&self) -> &'static str;

    /// Default settings. Must be side-effect free and, used unmodified,
    /// must produce a component that can be started.
    fn default_config(&self) -> Value;
}

pub trait SourceFactory: ComponentFactory {
    fn create_metrics_source(
        &self,
        settings: &CreateSettings,
        config: Value,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn Component>, ComponentError>;
}

pub trait TransformFactory: ComponentFactory {
    fn create_metrics_transform(
        &self,
        settings: &CreateSettings,
        config: Value,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn MetricsTransform>, ComponentError>;
}

pub trait SinkFactory: ComponentFactory {
    fn create_metrics_sink(
        &self,
        settings: &CreateSettings,
        config: Value,
    ) -> Result<Arc<dyn MetricsSink>, ComponentError>;
}

pub trait AuxiliaryFactory: ComponentFactory {
    fn create_auxiliary(
        &self,
        settings: &CreateSettings,
        config: Value,
    ) -> Result<Arc<dyn Component>, ComponentError>;
}

/// Tagged constructor, one variant per [`ComponentKind`].
#[derive(Clone)]
pub enum Factory {
    Source(Arc<dyn SourceFactory>),
    Transform(Arc<dyn TransformFactory>),
    Sink(Arc<dyn SinkFactory>),
    Auxiliary(Arc<dyn AuxiliaryFactory>),
}

impl Factory {
    pub fn source(factory: impl SourceFactory) -> Self {
        Self::Source(Arc::new(factory))
    }

    pub fn transform(factory: impl TransformFactory) -> Self {
        Self::Transform(Arc::new(factory))
    }

    pub fn sink(factory: impl SinkFactory) -> Self {
        Self::Sink(Arc::new(factory))
    }

    pub fn auxiliary(factory: impl AuxiliaryFactory) -> Self {
        Self::Auxiliary(Arc::new(factory))
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Source(_) => ComponentKind::Source,
            Self::Transform(_) => ComponentKind::Transform,
            Self::Sink(_) => ComponentKind::Sink,
            Self::Auxiliary(_) => ComponentKind::Auxiliary,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Source(f) => f.type_name(),
            Self::Transform(f) => f.type_name(),
            Self::Sink(f) => f.type_name(),
            Self::Auxiliary(f) => f.type_name(),
        }
    }

    pub fn default_config(&self) -> Value {
        match self {
            Self::Source(f) => f.default_config(),
            Self::Transform(f) => f.default_config(),
            Self::Sink(f) => f.default_config(),
            Self::Auxiliary(f) => f.default_config(),
        }
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("kind", &self.kind())
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Overlay user fields on top of factory defaults (top-level keys only).
///
/// A non-object default is replaced by the user object.
pub fn overlay_config(defaults: Value, user: serde_json::Map<String, Value>) -> Value {
    match defaults {
        Value::Object(mut base) => {
            base.extend(user);
            Value::Object(base)
        }
        _ => Value::Object(user),
    }
}

/// Decode settings into a factory's typed config.
///
/// # Errors
/// Returns [`ComponentError::Config`] if `config` is not an object or does
/// not match `T`.
pub fn decode_config<T: DeserializeOwned>(
    id: &ComponentId,
    config: Value,
) -> Result<T, ComponentError> {
    if !config.is_object() {
        return Err(ComponentError::config(
            id,
            format!("expected a settings object, got {config}"),
        ));
    }
    serde_json::from_value(config).map_err(|e| ComponentError::config(id, e.to_string()))
}
