//! Pipeline service.
//!
//! Builds every configured pipeline from a [`Factories`] set and an
//! [`AppConfig`], then owns the resulting components for their lifetime.
//!
//! # Wiring
//!
//! - Sinks are created once and shared by every pipeline that lists them.
//! - Transforms are created per pipeline, chained back to front so each
//!   forwards to the next and the last forwards to the pipeline's sinks.
//! - Sources are created once; a source listed in several pipelines feeds
//!   all of their heads through a [`FanOutConsumer`].
//!
//! # Lifecycle
//!
//! Start order is auxiliaries, sinks, transforms, sources, so no source
//! emits before its consumers are ready. Shutdown runs in reverse.
//! Fatal errors reported by components after start are delivered through
//! [`Service::wait_fatal`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use prometheus_client::registry::Registry;
use tokio::sync::{Mutex, mpsc};

use crate::component::{
    Component, ComponentError, ComponentId, ComponentKind, CreateSettings, Factories, Host,
    MetricsSink, MetricsTransform, MultiError, ValidationError,
};
use crate::config::{AppConfig, ComponentConfig};
use crate::consumer::{FanOutConsumer, MetricsConsumer};
use crate::obsreport::ReceiverMetrics;

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// [`Host`] implementation that forwards fatal errors to the service.
#[derive(Debug, Clone)]
pub struct ServiceHost {
    tx: mpsc::UnboundedSender<ComponentError>,
}

impl Host for ServiceHost {
    fn report_fatal_error(&self, error: ComponentError) {
        tracing::error!(error = %error, "Component reported fatal error");
        if self.tx.send(error).is_err() {
            tracing::warn!("Service no longer listening for fatal errors");
        }
    }
}

/// A created component and where it sits in the service.
struct Entry {
    kind: ComponentKind,
    id: ComponentId,
    pipeline: Option<String>,
    component: Arc<dyn Component>,
}

impl Entry {
    fn label(&self) -> String {
        match &self.pipeline {
            Some(p) => format!("{}[{p}]", self.id),
            None => self.id.to_string(),
        }
    }
}

/// Running set of pipelines.
pub struct Service {
    /// In start order.
    entries: Vec<Entry>,
    receiver_metrics: Arc<ReceiverMetrics>,
    host: Arc<ServiceHost>,
    fatal_rx: Mutex<mpsc::UnboundedReceiver<ComponentError>>,
}

/// Collects creation results while the service is being built.
struct Builder<'a> {
    factories: &'a Factories,
    config: &'a AppConfig,
    receiver_metrics: Arc<ReceiverMetrics>,
    errors: MultiError,
}

impl<'a> Builder<'a> {
    /// First entry of `kind` with `id`; duplicates were already reported.
    fn find(&self, kind: ComponentKind, id: &ComponentId) -> Option<&'a ComponentConfig> {
        self.config
            .components(kind)
            .iter()
            .find(|c| c.id().as_ref() == Ok(id))
    }

    fn settings(&self, id: &ComponentId) -> CreateSettings {
        CreateSettings::new(id.clone(), Arc::clone(&self.receiver_metrics))
    }

    /// Effective settings for `entry`, or `None` if its type is unknown.
    fn effective(&self, kind: ComponentKind, entry: &ComponentConfig) -> Option<serde_json::Value> {
        self.factories
            .default_config(kind, &entry.type_name)
            .map(|defaults| entry.effective_settings(defaults))
    }

    fn record<T>(
        &mut self,
        kind: ComponentKind,
        id: &ComponentId,
        result: Result<T, ComponentError>,
    ) -> Option<T> {
        result
            .map_err(|e| {
                let reason = match e {
                    ComponentError::Config { reason, .. } => reason,
                    other => other.to_string(),
                };
                self.errors.push(ValidationError::InvalidConfig {
                    kind,
                    id: id.to_string(),
                    reason,
                });
            })
            .ok()
    }

    fn sink(&mut self, id: &ComponentId) -> Option<Arc<dyn MetricsSink>> {
        let entry = self.find(ComponentKind::Sink, id)?;
        let factory = self.factories.sink(&entry.type_name)?;
        let config = self.effective(ComponentKind::Sink, entry)?;
        let result = factory.create_metrics_sink(&self.settings(id), config);
        self.record(ComponentKind::Sink, id, result)
    }

    fn transform(
        &mut self,
        id: &ComponentId,
        next: Arc<dyn MetricsConsumer>,
    ) -> Option<Arc<dyn MetricsTransform>> {
        let entry = self.find(ComponentKind::Transform, id)?;
        let factory = self.factories.transform(&entry.type_name)?;
        let config = self.effective(ComponentKind::Transform, entry)?;
        let result = factory.create_metrics_transform(&self.settings(id), config, next);
        self.record(ComponentKind::Transform, id, result)
    }

    fn source(
        &mut self,
        id: &ComponentId,
        next: Arc<dyn MetricsConsumer>,
    ) -> Option<Arc<dyn Component>> {
        let entry = self.find(ComponentKind::Source, id)?;
        let factory = self.factories.source(&entry.type_name)?;
        let config = self.effective(ComponentKind::Source, entry)?;
        let result = factory.create_metrics_source(&self.settings(id), config, next);
        self.record(ComponentKind::Source, id, result)
    }

    fn auxiliary(&mut self, entry: &ComponentConfig) -> Option<(ComponentId, Arc<dyn Component>)> {
        let id = entry.id().ok()?;
        let factory = self.factories.auxiliary(&entry.type_name)?;
        let config = self.effective(ComponentKind::Auxiliary, entry)?;
        let result = factory.create_auxiliary(&self.settings(&id), config);
        self.record(ComponentKind::Auxiliary, &id, result)
            .map(|c| (id, c))
    }
}

/// One consumer for `consumers`: the consumer itself when there is one,
/// otherwise a fan-out.
fn fan_out(mut consumers: Vec<Arc<dyn MetricsConsumer>>) -> Arc<dyn MetricsConsumer> {
    if consumers.len() == 1
        && let Some(only) = consumers.pop()
    {
        return only;
    }
    Arc::new(FanOutConsumer::new(consumers))
}

impl Service {
    /// Build every pipeline with fresh self-observability counters.
    ///
    /// # Errors
    /// Returns every validation and creation problem found.
    pub fn build(factories: &Factories, config: &AppConfig) -> Result<Self, MultiError> {
        Self::build_with_metrics(factories, config, Arc::new(ReceiverMetrics::new()))
    }

    /// Build every pipeline, recording receiver counters into `receiver_metrics`.
    ///
    /// Structural validation and component creation both run to completion
    /// so that all problems are reported together.
    ///
    /// # Errors
    /// Returns every validation and creation problem found.
    pub fn build_with_metrics(
        factories: &Factories,
        config: &AppConfig,
        receiver_metrics: Arc<ReceiverMetrics>,
    ) -> Result<Self, MultiError> {
        let mut b = Builder {
            factories,
            config,
            receiver_metrics: Arc::clone(&receiver_metrics),
            errors: config.validate(factories).err().unwrap_or_default(),
        };

        let mut auxiliaries = Vec::new();
        let mut sinks = Vec::new();
        let mut transforms = Vec::new();
        let mut sources = Vec::new();

        for entry in &config.auxiliaries {
            if let Some((id, component)) = b.auxiliary(entry) {
                auxiliaries.push(Entry {
                    kind: ComponentKind::Auxiliary,
                    id,
                    pipeline: None,
                    component,
                });
            }
        }

        // Shared sinks, created in first-reference order.
        let mut sink_by_id: BTreeMap<ComponentId, Arc<dyn MetricsSink>> = BTreeMap::new();
        for pipeline in config.pipelines.values() {
            for id in &pipeline.sinks {
                if sink_by_id.contains_key(id) {
                    continue;
                }
                if let Some(sink) = b.sink(id) {
                    sinks.push(Entry {
                        kind: ComponentKind::Sink,
                        id: id.clone(),
                        pipeline: None,
                        component: sink.clone(),
                    });
                    sink_by_id.insert(id.clone(), sink);
                }
            }
        }

        // Per-pipeline transform chains; collect each pipeline head per source.
        let mut heads: BTreeMap<ComponentId, Vec<Arc<dyn MetricsConsumer>>> = BTreeMap::new();
        for (name, pipeline) in &config.pipelines {
            let tail: Vec<Arc<dyn MetricsConsumer>> = pipeline
                .sinks
                .iter()
                .filter_map(|id| sink_by_id.get(id))
                .map(|s| Arc::clone(s) as Arc<dyn MetricsConsumer>)
                .collect();
            let mut next = fan_out(tail);

            for id in pipeline.transforms.iter().rev() {
                if let Some(transform) = b.transform(id, Arc::clone(&next)) {
                    transforms.push(Entry {
                        kind: ComponentKind::Transform,
                        id: id.clone(),
                        pipeline: Some(name.clone()),
                        component: transform.clone(),
                    });
                    next = transform;
                }
            }

            for id in &pipeline.sources {
                heads.entry(id.clone()).or_default().push(Arc::clone(&next));
            }
        }

        for (id, pipeline_heads) in heads {
            if let Some(source) = b.source(&id, fan_out(pipeline_heads)) {
                sources.push(Entry {
                    kind: ComponentKind::Source,
                    id,
                    pipeline: None,
                    component: source,
                });
            }
        }

        b.errors.into_result()?;

        warn_unused(config, ComponentKind::Source, &sources);
        warn_unused(config, ComponentKind::Sink, &sinks);

        let (tx, rx) = mpsc::unbounded_channel();
        let entries: Vec<Entry> = auxiliaries
            .into_iter()
            .chain(sinks)
            .chain(transforms)
            .chain(sources)
            .collect();
        tracing::info!(
            components = entries.len(),
            pipelines = config.pipelines.len(),
            "Service built"
        );

        Ok(Self {
            entries,
            receiver_metrics,
            host: Arc::new(ServiceHost { tx }),
            fatal_rx: Mutex::new(rx),
        })
    }

    /// Shared receiver counters.
    pub fn receiver_metrics(&self) -> &Arc<ReceiverMetrics> {
        &self.receiver_metrics
    }

    /// Host handed to components on start.
    pub fn host(&self) -> Arc<dyn Host> {
        self.host.clone()
    }

    /// Number of created components of `kind`.
    pub fn component_count(&self, kind: ComponentKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Encode the receiver counters in the Prometheus text format.
    ///
    /// # Errors
    /// Returns a formatting error from the encoder.
    pub fn encode_metrics(&self) -> Result<String, std::fmt::Error> {
        let mut registry = Registry::with_prefix("collectord");
        self.receiver_metrics.register(&mut registry);
        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &registry)?;
        Ok(out)
    }

    /// Start every component in dependency order.
    ///
    /// If a component fails to start, the ones already started are shut
    /// down again before the error is returned.
    ///
    /// # Errors
    /// Returns the first start failure.
    pub async fn start(&self) -> Result<(), ComponentError> {
        let host = self.host();
        for (started, entry) in self.entries.iter().enumerate() {
            if let Err(e) = entry.component.start(Arc::clone(&host)).await {
                tracing::error!(
                    kind = %entry.kind,
                    component = %entry.label(),
                    error = %e,
                    "Component failed to start"
                );
                self.shutdown_entries(&self.entries[..started]).await;
                return Err(e);
            }
            tracing::debug!(kind = %entry.kind, component = %entry.label(), "Component started");
        }
        tracing::info!(components = self.entries.len(), "Service started");
        Ok(())
    }

    /// Shut every component down in reverse start order.
    ///
    /// All components are asked to stop even if some fail.
    ///
    /// # Errors
    /// Returns the first shutdown failure.
    pub async fn shutdown(&self) -> Result<(), ComponentError> {
        match self.shutdown_entries(&self.entries).await {
            Some(e) => Err(e),
            None => {
                tracing::info!("Service shutdown complete");
                Ok(())
            }
        }
    }

    /// [`Service::shutdown`] bounded by `timeout`.
    ///
    /// # Errors
    /// Returns [`ComponentError::ShutdownTimeout`] if components are still
    /// stopping when `timeout` elapses.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<(), ComponentError> {
        match tokio::time::timeout(timeout, self.shutdown()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Service shutdown timed out");
                Err(ComponentError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Wait for the next fatal error reported by any component.
    ///
    /// The service holds its own host sender, so this stays pending until a
    /// component reports; it never yields `None` while the service is alive.
    pub async fn wait_fatal(&self) -> Option<ComponentError> {
        self.fatal_rx.lock().await.recv().await
    }

    async fn shutdown_entries(&self, entries: &[Entry]) -> Option<ComponentError> {
        let mut first = None;
        for entry in entries.iter().rev() {
            if let Err(e) = entry.component.shutdown().await {
                tracing::error!(
                    kind = %entry.kind,
                    component = %entry.label(),
                    error = %e,
                    "Component failed to shut down"
                );
                first.get_or_insert(e);
            }
        }
        first
    }
}

fn warn_unused(config: &AppConfig, kind: ComponentKind, created: &[Entry]) {
    let created: BTreeSet<&ComponentId> = created.iter().map(|e| &e.id).collect();
    for entry in config.components(kind) {
        if let Ok(id) = entry.id()
            && !created.contains(&id)
        {
            tracing::warn!(kind = %kind, component = %id, "Component not used by any pipeline");
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field(
                "components",
                &self.entries.iter().map(Entry::label).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::default_factories;

    fn factories() -> Factories {
        default_factories().build().unwrap()
    }

    const CONFIG: &str = r#"
sources:
  - type: http_size
    source_url: http://127.0.0.1:9/
  - type: http_size
    name: variant
    source_url: http://127.0.0.1:9/other
transforms:
  - type: static_labels
    labels: { env: test }
sinks:
  - type: logging
auxiliaries:
  - type: heartbeat
pipelines:
  a:
    sources: [http_size, http_size/variant]
    transforms: [static_labels]
    sinks: [logging]
  b:
    sources: [http_size]
    sinks: [logging]
"#;

    #[test]
    fn test_build_creates_components_once() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let service = Service::build(&factories(), &config).unwrap();

        assert_eq!(service.component_count(ComponentKind::Source), 2);
        assert_eq!(service.component_count(ComponentKind::Transform), 1);
        assert_eq!(service.component_count(ComponentKind::Sink), 1);
        assert_eq!(service.component_count(ComponentKind::Auxiliary), 1);
    }

    #[test]
    fn test_build_reports_structural_and_settings_errors_together() {
        let yaml = r#"
sources:
  - type: http_size
    source_url: "not a url"
  - type: http_size
    name: slow
    collection_interval: 0s
sinks:
  - type: logging
    verbosity: loud
pipelines:
  a:
    sources: [http_size, http_size/slow, missing]
    sinks: [logging]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        let err = Service::build(&factories(), &config).unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("unknown source 'missing'"), "{msg}");
        assert!(msg.contains("invalid source 'http_size'"), "{msg}");
        assert!(msg.contains("invalid source 'http_size/slow'"), "{msg}");
        assert!(msg.contains("invalid sink 'logging'"), "{msg}");
        assert_eq!(err.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let service = Service::build(&factories(), &config).unwrap();

        service.start().await.unwrap();
        service
            .shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
            .await
            .unwrap();
        // Shutting down twice is harmless.
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_host_delivers_fatal_errors() {
        let service = Service::build(&factories(), &AppConfig::default()).unwrap();
        service.host().report_fatal_error(ComponentError::Fatal {
            id: ComponentId::new("http_size"),
            message: "gone".to_string(),
        });
        let err = service.wait_fatal().await.unwrap();
        assert!(err.to_string().contains("gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_fatal_pending_without_reports() {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let service = Service::build(&factories(), &config).unwrap();
        service.start().await.unwrap();
        service.shutdown().await.unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(60), service.wait_fatal()).await;
        assert!(waited.is_err(), "expected no fatal error, got {waited:?}");
    }

    #[test]
    fn test_encode_metrics_uses_prefix() {
        let service = Service::build(&factories(), &AppConfig::default()).unwrap();
        let labels = crate::obsreport::ReceiverLabels {
            receiver: "http_size".to_string(),
            transport: "http".to_string(),
        };
        // Touch a counter so the family has a sample.
        service.receiver_metrics().accepted_points(&labels);
        let text = service.encode_metrics().unwrap();
        assert!(text.contains("collectord_receiver_accepted_metric_points_total"));
    }
}
