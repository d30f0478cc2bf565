//! Collection unit: one fetch, translate and forward cycle per tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::collector::{CollectError, SourceClient, Translator};
use crate::component::ComponentId;
use crate::consumer::MetricsConsumer;
use crate::obsreport::{ObsReport, Outcome};
use crate::scheduler::Runnable;

/// Clock used to stamp translated points.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Binds a client, a translator and the next consumer.
///
/// Each [`Runnable::run`] call opens a receive operation, fetches one
/// response, translates it, forwards the batch and closes the operation
/// with the counts and outcome. Every failure path closes it too.
pub struct CollectionUnit<C, T> {
    id: ComponentId,
    client: C,
    translator: T,
    consumer: Arc<dyn MetricsConsumer>,
    obs: ObsReport,
    clock: Clock,
}

impl<C, T> CollectionUnit<C, T>
where
    C: SourceClient,
    T: Translator<Input = C::Response>,
{
    pub fn new(
        id: ComponentId,
        client: C,
        translator: T,
        consumer: Arc<dyn MetricsConsumer>,
        obs: ObsReport,
    ) -> Self {
        Self {
            id,
            client,
            translator,
            consumer,
            obs,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn obs(&self) -> &ObsReport {
        &self.obs
    }

    async fn collect(&self) -> Result<(), CollectError> {
        let op = self.obs.start_receive_op();

        let response = match self.client.fetch().await {
            Ok(r) => r,
            Err(e) => {
                let err = CollectError::from(e);
                op.end(0, 0, err.outcome());
                return Err(err);
            }
        };

        let batch = match self.translator.translate(response, (self.clock)()) {
            Ok(b) => b,
            Err(e) => {
                op.end(0, 0, Outcome::Translate);
                return Err(e.into());
            }
        };

        let (series, points) = batch.counts();
        match self.consumer.consume(batch).await {
            Ok(()) => {
                op.end(series, points, Outcome::Success);
                tracing::debug!(source = %self.id, series, points, "Batch forwarded");
                Ok(())
            }
            Err(e) => {
                op.end(series, points, Outcome::Consumer);
                Err(e.into())
            }
        }
    }
}

#[async_trait::async_trait]
impl<C, T> Runnable for CollectionUnit<C, T>
where
    C: SourceClient,
    T: Translator<Input = C::Response>,
{
    type Error = CollectError;

    async fn setup(&self) -> Result<(), CollectError> {
        self.client.setup().await
    }

    async fn run(&self) -> Result<(), CollectError> {
        let result = self.collect().await;
        if let Err(e) = &result {
            match e {
                CollectError::Fetch(f) if !f.is_permanent() => {
                    tracing::warn!(source = %self.id, error = %e, "Collection failed, retrying next tick");
                }
                CollectError::Consumer(c) if !c.is_permanent() => {
                    tracing::warn!(source = %self.id, error = %e, "Downstream refused batch");
                }
                _ => {
                    tracing::error!(source = %self.id, error = %e, "Collection failed");
                }
            }
        }
        result
    }
}

impl<C, T> std::fmt::Debug for CollectionUnit<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionUnit")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FetchError;
    use crate::consumer::{CapturingConsumer, ConsumerError};
    use crate::model::{Metric, MetricBatch, MetricPoint, MetricSeries, MetricType, ModelError};
    use crate::obsreport::ReceiverMetrics;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Client replaying scripted results, then repeating the last one.
    struct ScriptedClient {
        script: Mutex<Vec<Result<i64, FetchError>>>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<Result<i64, FetchError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait::async_trait]
    impl SourceClient for ScriptedClient {
        type Response = i64;

        async fn fetch(&self) -> Result<i64, FetchError> {
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script.last().cloned().unwrap()
            }
        }
    }

    struct SizeTranslator;

    impl Translator for SizeTranslator {
        type Input = i64;

        fn translate(&self, input: i64, now: DateTime<Utc>) -> Result<MetricBatch, ModelError> {
            if input < 0 {
                return Err(ModelError::EmptyName);
            }
            let metric = Metric::new("size", MetricType::GaugeInt64, vec![])?
                .with_series(MetricSeries::new(vec![]).with_point(MetricPoint::int64(now, input)))?;
            Ok(vec![metric].into())
        }
    }

    fn unit(
        script: Vec<Result<i64, FetchError>>,
        consumer: Arc<CapturingConsumer>,
    ) -> CollectionUnit<ScriptedClient, SizeTranslator> {
        let obs = ObsReport::new("test", "http", "test", Arc::new(ReceiverMetrics::new()));
        CollectionUnit::new(
            ComponentId::new("test"),
            ScriptedClient::new(script),
            SizeTranslator,
            consumer,
            obs,
        )
    }

    #[tokio::test]
    async fn test_successful_tick_forwards_batch_with_clock_timestamp() {
        let consumer = Arc::new(CapturingConsumer::new());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let unit = unit(vec![Ok(20)], Arc::clone(&consumer)).with_clock(Arc::new(move || at));

        unit.run().await.unwrap();

        let batches = consumer.batches();
        assert_eq!(batches.len(), 1);
        let point = &batches[0].metrics()[0].series()[0].points[0];
        assert_eq!(point.timestamp, at);
        assert_eq!(point, &MetricPoint::int64(at, 20));

        let labels = unit.obs().labels();
        let metrics = unit.obs().metrics();
        assert_eq!(metrics.accepted_points(labels), 1);
        assert_eq!(metrics.operations(labels, Outcome::Success), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_forwards_nothing() {
        let consumer = Arc::new(CapturingConsumer::new());
        let unit = unit(
            vec![Err(FetchError::Transient("connection refused".into()))],
            Arc::clone(&consumer),
        );

        let err = unit.run().await.unwrap_err();
        assert!(matches!(err, CollectError::Fetch(FetchError::Transient(_))));
        assert_eq!(consumer.batch_count(), 0);
        assert_eq!(
            unit.obs().metrics().operations(unit.obs().labels(), Outcome::Transient),
            1
        );
    }

    #[tokio::test]
    async fn test_translate_failure_is_reported() {
        let consumer = Arc::new(CapturingConsumer::new());
        let unit = unit(vec![Ok(-1)], Arc::clone(&consumer));

        let err = unit.run().await.unwrap_err();
        assert!(matches!(err, CollectError::Translate(_)));
        assert_eq!(consumer.batch_count(), 0);
        assert_eq!(
            unit.obs().metrics().operations(unit.obs().labels(), Outcome::Translate),
            1
        );
    }

    #[tokio::test]
    async fn test_consumer_failure_counts_refused_points() {
        let consumer = Arc::new(CapturingConsumer::new());
        consumer.fail_with(ConsumerError::Transient("queue full".into()));
        let unit = unit(vec![Ok(7)], Arc::clone(&consumer));

        let err = unit.run().await.unwrap_err();
        assert!(matches!(err, CollectError::Consumer(_)));
        let labels = unit.obs().labels();
        let metrics = unit.obs().metrics();
        assert_eq!(metrics.refused_points(labels), 1);
        assert_eq!(metrics.accepted_points(labels), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let consumer = Arc::new(CapturingConsumer::new());
        let unit = unit(
            vec![Err(FetchError::Transient("timeout".into())), Ok(3)],
            Arc::clone(&consumer),
        );

        assert!(unit.run().await.is_err());
        unit.run().await.unwrap();
        assert_eq!(consumer.batch_count(), 1);
    }
}
