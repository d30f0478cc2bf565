//! Configuration module for the collector service.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Component instances per kind (sources, transforms, sinks, auxiliaries)
//! - Pipelines wiring sources through transforms into sinks
//!
//! Per-instance settings stay type-erased (`serde_json::Value`) until the
//! owning factory decodes them.

mod app;
mod component;
mod validation;

pub use app::AppConfig;
pub use component::{ComponentConfig, PipelineSpec};
pub use validation::{ConfigError, expand_env_vars, parse_duration};
