//! Component Layer
//!
//! Factory registry and lifecycle contracts for pipeline components.
//!
//! # Architecture
//!
//! - [`ComponentKind`] / [`ComponentId`]: what a component is and how an instance is named
//! - [`Factory`]: tagged constructor, one variant per kind
//! - [`FactoriesBuilder`] / [`Factories`]: registration, validation, immutable lookup
//! - [`Component`] / [`Host`]: start/shutdown contract and the fatal-error sink
//! - [`MultiError`]: aggregated validation failures

mod error;
mod factory;
mod id;
mod kind;
mod lifecycle;
mod registry;

pub use error::{ComponentError, MultiError, ValidationError};
pub use factory::{
    AuxiliaryFactory, ComponentFactory, CreateSettings, Factory, SinkFactory, SourceFactory,
    TransformFactory, decode_config, overlay_config,
};
pub use id::{ComponentId, IdError};
pub use kind::ComponentKind;
pub use lifecycle::{Component, Host, MetricsSink, MetricsTransform, NopHost};
pub use registry::{Factories, FactoriesBuilder};
