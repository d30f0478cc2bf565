//! End-to-end pipeline tests driven through configuration and extension
//! factories.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use collectord::collector::http_size::ResponseSizeTranslator;
use collectord::component::{
    Component, ComponentError, ComponentFactory, CreateSettings, Host, MetricsSink, SinkFactory,
    SourceFactory, decode_config,
};
use collectord::components::build_factories;
use collectord::consumer::CapturingConsumer;
use collectord::obsreport::{ObsReport, Outcome, ReceiverLabels};
use collectord::{
    AppConfig, CollectError, CollectionUnit, ConsumerError, FactoriesBuilder, Factory, FetchError,
    MetricBatch, MetricsConsumer, PointValue, Runnable, ScrapeSource, Service, SourceClient,
};

// =============================================================================
// Extension source: reports a fixed size, optionally failing some ticks
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixedConfig {
    value: i64,
    #[serde(with = "humantime_serde")]
    interval: Duration,
    #[serde(default)]
    fail_first: usize,
}

struct FixedClient {
    value: i64,
    fail_first: usize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl SourceClient for FixedClient {
    type Response = i64;

    async fn fetch(&self) -> Result<i64, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(FetchError::Transient("HTTP 503 \"Service Unavailable\"".into()));
        }
        Ok(self.value)
    }
}

struct FixedSourceFactory;

impl ComponentFactory for FixedSourceFactory {
    fn type_name(&self) -> &'static str {
        "fixed"
    }

    fn default_config(&self) -> Value {
        json!({ "value": 0, "interval": "1s" })
    }
}

impl SourceFactory for FixedSourceFactory {
    fn create_metrics_source(
        &self,
        settings: &CreateSettings,
        config: Value,
        next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn Component>, ComponentError> {
        let config: FixedConfig = decode_config(&settings.id, config)?;
        let client = FixedClient {
            value: config.value,
            fail_first: config.fail_first,
            calls: AtomicUsize::new(0),
        };
        let obs = ObsReport::new(
            settings.id.to_string(),
            "test",
            "fixed",
            Arc::clone(&settings.receiver_metrics),
        );
        let at: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        let unit = CollectionUnit::new(settings.id.clone(), client, ResponseSizeTranslator, next, obs)
            .with_clock(Arc::new(move || at));
        Ok(Arc::new(ScrapeSource::new(
            settings.id.clone(),
            config.interval,
            unit,
        )))
    }
}

// =============================================================================
// Extension source: fails fatally on its first tick
// =============================================================================

struct Doomed;

#[async_trait::async_trait]
impl Runnable for Doomed {
    type Error = CollectError;

    async fn run(&self) -> Result<(), CollectError> {
        Err(CollectError::Fatal("credentials revoked".to_string()))
    }
}

struct DoomedSourceFactory;

impl ComponentFactory for DoomedSourceFactory {
    fn type_name(&self) -> &'static str {
        "doomed"
    }

    fn default_config(&self) -> Value {
        json!({})
    }
}

impl SourceFactory for DoomedSourceFactory {
    fn create_metrics_source(
        &self,
        settings: &CreateSettings,
        _config: Value,
        _next: Arc<dyn MetricsConsumer>,
    ) -> Result<Arc<dyn Component>, ComponentError> {
        Ok(Arc::new(ScrapeSource::new(
            settings.id.clone(),
            Duration::from_secs(1),
            Doomed,
        )))
    }
}

// =============================================================================
// Extension sink: shares one capturing consumer with the test
// =============================================================================

struct CaptureSink(Arc<CapturingConsumer>);

#[async_trait::async_trait]
impl MetricsConsumer for CaptureSink {
    async fn consume(&self, batch: MetricBatch) -> Result<(), ConsumerError> {
        self.0.consume(batch).await
    }
}

#[async_trait::async_trait]
impl Component for CaptureSink {
    async fn start(&self, _host: Arc<dyn Host>) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

impl MetricsSink for CaptureSink {}

struct CaptureSinkFactory(Arc<CapturingConsumer>);

impl ComponentFactory for CaptureSinkFactory {
    fn type_name(&self) -> &'static str {
        "capture"
    }

    fn default_config(&self) -> Value {
        json!({})
    }
}

impl SinkFactory for CaptureSinkFactory {
    fn create_metrics_sink(
        &self,
        _settings: &CreateSettings,
        _config: Value,
    ) -> Result<Arc<dyn MetricsSink>, ComponentError> {
        Ok(Arc::new(CaptureSink(Arc::clone(&self.0))))
    }
}

fn service(yaml: &str, capture: &Arc<CapturingConsumer>) -> Service {
    let extensions = FactoriesBuilder::new()
        .register(Factory::source(FixedSourceFactory))
        .register(Factory::source(DoomedSourceFactory))
        .register(Factory::sink(CaptureSinkFactory(Arc::clone(capture))));
    let factories = build_factories(extensions).unwrap();
    let config = AppConfig::from_yaml(yaml).unwrap();
    Service::build(&factories, &config).unwrap()
}

fn values_by_instance(batches: &[MetricBatch]) -> Vec<(String, i64)> {
    let mut out: Vec<(String, i64)> = batches
        .iter()
        .flat_map(|b| b.metrics())
        .flat_map(|m| {
            let idx = m.label_keys().iter().position(|k| k == "instance");
            m.series().iter().map(move |s| {
                let instance = idx.map(|i| s.label_values[i].clone()).unwrap_or_default();
                let value = match s.points[0].value {
                    PointValue::Int64(v) => v,
                    PointValue::Double(v) => v as i64,
                };
                (instance, value)
            })
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_qualified_instances_are_independent() {
    let capture = Arc::new(CapturingConsumer::new());
    let service = service(
        r#"
sources:
  - type: fixed
    value: 20
  - type: fixed
    name: variant
    value: 7
    interval: 2s
transforms:
  - type: static_labels
    name: default
    labels: { instance: default }
  - type: static_labels
    name: variant
    labels: { instance: variant }
sinks:
  - type: capture
pipelines:
  default:
    sources: [fixed]
    transforms: [static_labels/default]
    sinks: [capture]
  variant:
    sources: [fixed/variant]
    transforms: [static_labels/variant]
    sinks: [capture]
"#,
        &capture,
    );

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_100)).await;
    service.shutdown().await.unwrap();

    let batches = capture.batches();
    // 4 ticks of the 1s source, 2 of the 2s source.
    assert_eq!(batches.len(), 6);
    assert_eq!(
        values_by_instance(&batches),
        vec![("default".to_string(), 20), ("variant".to_string(), 7)]
    );

    let metric = &batches[0].metrics()[0];
    assert_eq!(metric.name(), "httpResponseSize");
    assert_eq!(metric.label_keys(), ["label1", "label2", "instance"]);

    let metrics = service.receiver_metrics();
    let default = ReceiverLabels {
        receiver: "fixed".to_string(),
        transport: "test".to_string(),
    };
    let variant = ReceiverLabels {
        receiver: "fixed/variant".to_string(),
        transport: "test".to_string(),
    };
    assert_eq!(metrics.accepted_points(&default), 4);
    assert_eq!(metrics.accepted_points(&variant), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_keep_scheduling() {
    let capture = Arc::new(CapturingConsumer::new());
    let service = service(
        r#"
sources:
  - type: fixed
    value: 20
    fail_first: 3
sinks:
  - type: capture
pipelines:
  metrics:
    sources: [fixed]
    sinks: [capture]
"#,
        &capture,
    );

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(capture.batch_count(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    service.shutdown().await.unwrap();

    assert_eq!(capture.batch_count(), 2);
    let labels = ReceiverLabels {
        receiver: "fixed".to_string(),
        transport: "test".to_string(),
    };
    let metrics = service.receiver_metrics();
    assert_eq!(metrics.operations(&labels, Outcome::Transient), 3);
    assert_eq!(metrics.operations(&labels, Outcome::Success), 2);
}

#[tokio::test(start_paused = true)]
async fn test_source_fans_out_to_every_pipeline() {
    let capture = Arc::new(CapturingConsumer::new());
    let service = service(
        r#"
sources:
  - type: fixed
    value: 5
transforms:
  - type: static_labels
    name: a
    labels: { instance: a }
  - type: static_labels
    name: b
    labels: { instance: b }
sinks:
  - type: capture
pipelines:
  a:
    sources: [fixed]
    transforms: [static_labels/a]
    sinks: [capture]
  b:
    sources: [fixed]
    transforms: [static_labels/b]
    sinks: [capture]
"#,
        &capture,
    );

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    service.shutdown().await.unwrap();

    let batches = capture.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        values_by_instance(&batches),
        vec![("a".to_string(), 5), ("b".to_string(), 5)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_reaches_service() {
    let capture = Arc::new(CapturingConsumer::new());
    let service = service(
        r#"
sources:
  - type: doomed
sinks:
  - type: capture
pipelines:
  metrics:
    sources: [doomed]
    sinks: [capture]
"#,
        &capture,
    );

    service.start().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), service.wait_fatal())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, ComponentError::Fatal { .. }));
    assert!(err.to_string().contains("credentials revoked"));
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_types_and_bad_settings_reported_together() {
    let capture = Arc::new(CapturingConsumer::new());
    let extensions = FactoriesBuilder::new()
        .register(Factory::source(FixedSourceFactory))
        .register(Factory::sink(CaptureSinkFactory(Arc::clone(&capture))));
    let factories = build_factories(extensions).unwrap();

    let config = AppConfig::from_yaml(
        r#"
sources:
  - type: fixed
    value: "twenty"
  - type: kafka
sinks:
  - type: capture
pipelines:
  metrics:
    sources: [fixed, kafka]
    sinks: [capture]
"#,
    )
    .unwrap();

    let err = Service::build(&factories, &config).unwrap_err();
    let msg = err.to_string();
    assert_eq!(err.len(), 2, "{msg}");
    assert!(msg.contains("unknown source type 'kafka'"), "{msg}");
    assert!(msg.contains("invalid source 'fixed'"), "{msg}");
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/config.yaml");
    let config = AppConfig::load(path).unwrap();
    let factories = build_factories(FactoriesBuilder::new()).unwrap();
    config.validate(&factories).unwrap();
    Service::build(&factories, &config).unwrap();
}
