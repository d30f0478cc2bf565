//! `logging` sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

use crate::component::{
    Component, ComponentError, ComponentFactory, ComponentId, CreateSettings, Host, MetricsSink,
    SinkFactory, decode_config,
};
use crate::consumer::{ConsumerError, MetricsConsumer};
use crate::model::MetricBatch;

pub const TYPE_NAME: &str = "logging";

/// How much of each batch is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verbosity {
    /// Counts only.
    #[default]
    Basic,
    /// Counts plus the batch as JSON at `debug` level.
    Detailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbosity: Verbosity,
}

/// Terminates a pipeline by logging every batch it receives.
#[derive(Debug)]
pub struct LoggingSink {
    id: ComponentId,
    verbosity: Verbosity,
    batches: AtomicU64,
}

impl LoggingSink {
    pub fn new(id: ComponentId, verbosity: Verbosity) -> Self {
        Self {
            id,
            verbosity,
            batches: AtomicU64::new(0),
        }
    }

    /// Batches accepted so far.
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for LoggingSink {
    async fn consume(&self, batch: MetricBatch) -> Result<(), ConsumerError> {
        self.batches.fetch_add(1, Ordering::Relaxed);
        let (series, points) = batch.counts();
        tracing::info!(
            sink = %self.id,
            metrics = batch.len(),
            series,
            points,
            "Metrics received"
        );

        if self.verbosity == Verbosity::Detailed {
            match serde_json::to_string(&batch) {
                Ok(json) => tracing::debug!(sink = %self.id, batch = %json, "Batch contents"),
                Err(e) => tracing::warn!(sink = %self.id, error = %e, "Failed to encode batch"),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Component for LoggingSink {
    async fn start(&self, _host: Arc<dyn Host>) -> Result<(), ComponentError> {
        tracing::info!(sink = %self.id, verbosity = %self.verbosity, "Sink started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        tracing::info!(sink = %self.id, batches = self.batch_count(), "Sink stopped");
        Ok(())
    }
}

impl MetricsSink for LoggingSink {}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSinkFactory;

impl ComponentFactory for LoggingSinkFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(LoggingConfig::default()).unwrap_or_default()
    }
}

impl SinkFactory for LoggingSinkFactory {
    fn create_metrics_sink(
        &self,
        settings: &CreateSettings,
        config: Value,
    ) -> Result<Arc<dyn MetricsSink>, ComponentError> {
        let config: LoggingConfig = decode_config(&settings.id, config)?;
        Ok(Arc::new(LoggingSink::new(settings.id.clone(), config.verbosity)))
    }
}
