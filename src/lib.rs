//! collectord - pluggable telemetry collection pipeline
//!
//! Sources periodically pull data from external systems, translate it into a
//! canonical metric model and push it through transforms into sinks.
//! Components are created by type from a factory registry and wired together
//! from a YAML configuration.
//!
//! # Architecture
//!
//! - **Model**: canonical metrics, series and points ([`model`])
//! - **Scheduling**: fixed-interval, non-overlapping tick loops ([`scheduler`])
//! - **Collection**: fetch, translate and forward per tick ([`collector`])
//! - **Components**: factory registry and lifecycle ([`component`])
//! - **Pipelines**: configuration and the running service ([`config`], [`service`])
//! - **Self-observability**: receiver counters ([`obsreport`])
//!
//! # Example
//!
//! ```rust,no_run
//! use collectord::{AppConfig, FactoriesBuilder, Service, components::build_factories};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factories = build_factories(FactoriesBuilder::new())?;
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let service = Service::build(&factories, &config)?;
//!
//!     service.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod auxiliary;
pub mod collector;
pub mod component;
pub mod components;
pub mod config;
pub mod consumer;
pub mod model;
pub mod obsreport;
pub mod scheduler;
pub mod service;
pub mod sink;
pub mod transform;

pub use collector::{CollectError, CollectionUnit, FetchError, ScrapeSource, SourceClient, Translator};
pub use component::{
    Component, ComponentError, ComponentId, ComponentKind, Factories, FactoriesBuilder, Factory,
    Host, MultiError, ValidationError,
};
pub use config::{AppConfig, ConfigError};
pub use consumer::{ConsumerError, MetricsConsumer};
pub use model::{Metric, MetricBatch, MetricPoint, MetricSeries, MetricType, ModelError, PointValue};
pub use scheduler::{Halt, IntervalRunner, Runnable, SchedulerError};
pub use service::Service;
