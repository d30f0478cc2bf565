//! `static_labels` transform.
//!
//! Adds the configured key/value pairs to every metric of a batch. Keys the
//! metric already carries are overwritten, so the label key and label value
//! counts stay aligned.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::{
    Component, ComponentError, ComponentFactory, ComponentId, CreateSettings, Host,
    MetricsTransform, TransformFactory, decode_config,
};
use crate::consumer::{ConsumerError, MetricsConsumer};
use crate::model::MetricBatch;

pub const TYPE_NAME: &str = "static_labels";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticLabelsConfig {
    /// Labels applied to every metric, in key order.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Transform that upserts fixed labels and forwards to the next consumer.
pub struct StaticLabels {
    id: ComponentId,
    labels: BTreeMap<String, String>,
    next: Arc<dyn MetricsConsumer>,
}

impl StaticLabels {
    pub fn new(
        id: ComponentId,
        labels: BTreeMap<String, String>,
        next: Arc<dyn MetricsConsumer>,
    ) -> Self {
        Self { id, labels, next }
    }
}

impl std::fmt::Debug for StaticLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLabels")
            .field("id", &self.id)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl MetricsConsumer for StaticLabels {
    async fn consume(&self, mut batch: MetricBatch) -> Result<(), ConsumerError> {
        for metric in batch.metrics_mut() {
            for (key, value) in &self.labels {
                metric.upsert_label(key, value);
            }
        }
        self.next.consume(batch).await
    }
}

#[async_trait::async_trait]
impl Component for StaticLabels {
    async fn start(&self, _host: Arc<dyn Host>) -> Result<(), ComponentError> {
        tracing::debug!(transform = %self.id, labels = self.labels.len(), "Transform started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

impl MetricsTransform for StaticLabels {}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLabelsFactory;

impl ComponentFactory for StaticLabelsFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(StaticLabelsConfig::default()).unwrap_or_default()
    }
}

impl TransformFactory for StaticLabelsFactory {
    fn create_metrics_transform(
        &self,
        settings: &CreateSettings,
        config: Value,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn MetricsTransform>, ComponentError> {
        let config: StaticLabelsConfig = decode_config(&settings.id, config)?;
        if config.labels.keys().any(String::is_empty) {
            return Err(ComponentError::config(&settings.id, "label keys cannot be empty"));
        }
        Ok(Arc::new(StaticLabels::new(
            settings.id.clone(),
            config.labels,
            next,
        )))
    }
}
