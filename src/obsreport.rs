//! Receiver self-observability.
//!
//! Every collection tick opens a [`ReceiveOp`] through
//! [`ObsReport::start_receive_op`] and closes it with [`ReceiveOp::end`],
//! recording how many series and points were forwarded and the outcome.
//! `end` consumes the scope, so it cannot be closed twice; a scope that is
//! dropped without `end` (panic, cancelled future) is recorded as a
//! `dropped` operation.
//!
//! Counters live in [`ReceiverMetrics`] and are exposed through a
//! `prometheus_client` registry.

use std::sync::Arc;
use std::time::Instant;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Label set shared by all receiver counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReceiverLabels {
    pub receiver: String,
    pub transport: String,
}

/// Terminal state of one receive operation.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Success,
    Permanent,
    Transient,
    Translate,
    Consumer,
    Dropped,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub receiver: String,
    pub transport: String,
    pub outcome: Outcome,
}

/// Counter families for every receiver in the process.
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    accepted_points: Family<ReceiverLabels, Counter>,
    refused_points: Family<ReceiverLabels, Counter>,
    accepted_series: Family<ReceiverLabels, Counter>,
    operations: Family<OperationLabels, Counter>,
}

impl ReceiverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach all families to `registry`.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "receiver_accepted_metric_points",
            "Metric points successfully forwarded by the receiver",
            self.accepted_points.clone(),
        );
        registry.register(
            "receiver_refused_metric_points",
            "Metric points the downstream consumer refused",
            self.refused_points.clone(),
        );
        registry.register(
            "receiver_accepted_series",
            "Time series successfully forwarded by the receiver",
            self.accepted_series.clone(),
        );
        registry.register(
            "receiver_operations",
            "Receive operations by outcome",
            self.operations.clone(),
        );
    }

    pub fn accepted_points(&self, labels: &ReceiverLabels) -> u64 {
        self.accepted_points.get_or_create(labels).get()
    }

    pub fn refused_points(&self, labels: &ReceiverLabels) -> u64 {
        self.refused_points.get_or_create(labels).get()
    }

    pub fn accepted_series(&self, labels: &ReceiverLabels) -> u64 {
        self.accepted_series.get_or_create(labels).get()
    }

    pub fn operations(&self, labels: &ReceiverLabels, outcome: Outcome) -> u64 {
        self.operations
            .get_or_create(&OperationLabels {
                receiver: labels.receiver.clone(),
                transport: labels.transport.clone(),
                outcome,
            })
            .get()
    }

    fn record(&self, labels: &ReceiverLabels, record: &OpRecord) {
        let (series, points) = (record.series as u64, record.points as u64);
        if record.outcome == Outcome::Success {
            self.accepted_points.get_or_create(labels).inc_by(points);
            self.accepted_series.get_or_create(labels).inc_by(series);
        } else if points > 0 {
            self.refused_points.get_or_create(labels).inc_by(points);
        }
        self.operations
            .get_or_create(&OperationLabels {
                receiver: labels.receiver.clone(),
                transport: labels.transport.clone(),
                outcome: record.outcome,
            })
            .inc();
    }
}

/// Per-receiver handle used to open receive operations.
#[derive(Debug, Clone)]
pub struct ObsReport {
    labels: ReceiverLabels,
    data_format: &'static str,
    metrics: Arc<ReceiverMetrics>,
}

impl ObsReport {
    pub fn new(
        receiver: impl Into<String>,
        transport: &'static str,
        data_format: &'static str,
        metrics: Arc<ReceiverMetrics>,
    ) -> Self {
        Self {
            labels: ReceiverLabels {
                receiver: receiver.into(),
                transport: transport.to_string(),
            },
            data_format,
            metrics,
        }
    }

    pub fn labels(&self) -> &ReceiverLabels {
        &self.labels
    }

    pub fn metrics(&self) -> &Arc<ReceiverMetrics> {
        &self.metrics
    }

    /// Open the scope for one tick.
    pub fn start_receive_op(&self) -> ReceiveOp {
        tracing::trace!(
            receiver = %self.labels.receiver,
            transport = %self.labels.transport,
            format = self.data_format,
            "Receive operation started"
        );
        ReceiveOp {
            report: self.clone(),
            started: Instant::now(),
            ended: false,
        }
    }
}

struct OpRecord {
    series: usize,
    points: usize,
    outcome: Outcome,
}

/// Instrumentation scope for a single tick.
#[must_use = "a receive operation must be ended exactly once"]
pub struct ReceiveOp {
    report: ObsReport,
    started: Instant,
    ended: bool,
}

impl ReceiveOp {
    /// Close the scope.
    ///
    /// For a failed tick pass the number of series/points that were refused
    /// (zero when nothing was produced).
    pub fn end(mut self, series: usize, points: usize, outcome: Outcome) {
        self.finish(OpRecord {
            series,
            points,
            outcome,
        });
    }

    fn finish(&mut self, record: OpRecord) {
        self.ended = true;
        let labels = &self.report.labels;
        self.report.metrics.record(labels, &record);
        tracing::trace!(
            receiver = %labels.receiver,
            format = self.report.data_format,
            series = record.series,
            points = record.points,
            outcome = ?record.outcome,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Receive operation ended"
        );
    }
}

impl Drop for ReceiveOp {
    fn drop(&mut self) {
        if !self.ended {
            tracing::warn!(
                receiver = %self.report.labels.receiver,
                "Receive operation dropped without being ended"
            );
            self.finish(OpRecord {
                series: 0,
                points: 0,
                outcome: Outcome::Dropped,
            });
        }
    }
}

impl std::fmt::Debug for ReceiveOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveOp")
            .field("receiver", &self.report.labels.receiver)
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    fn report() -> ObsReport {
        ObsReport::new("http_size", "http", "http_size", Arc::new(ReceiverMetrics::new()))
    }

    #[test]
    fn test_success_records_accepted() {
        let report = report();
        report.start_receive_op().end(1, 3, Outcome::Success);
        report.start_receive_op().end(2, 2, Outcome::Success);

        let metrics = report.metrics();
        assert_eq!(metrics.accepted_points(report.labels()), 5);
        assert_eq!(metrics.accepted_series(report.labels()), 3);
        assert_eq!(metrics.refused_points(report.labels()), 0);
        assert_eq!(metrics.operations(report.labels(), Outcome::Success), 2);
    }

    #[test]
    fn test_failure_records_refused_and_outcome() {
        let report = report();
        report.start_receive_op().end(0, 0, Outcome::Transient);
        report.start_receive_op().end(1, 4, Outcome::Consumer);

        let metrics = report.metrics();
        assert_eq!(metrics.accepted_points(report.labels()), 0);
        assert_eq!(metrics.refused_points(report.labels()), 4);
        assert_eq!(metrics.operations(report.labels(), Outcome::Transient), 1);
        assert_eq!(metrics.operations(report.labels(), Outcome::Consumer), 1);
    }

    #[test]
    fn test_dropped_scope_is_recorded_once() {
        let report = report();
        {
            let _op = report.start_receive_op();
        }
        assert_eq!(
            report.metrics().operations(report.labels(), Outcome::Dropped),
            1
        );

        // An ended scope must not also count as dropped.
        report.start_receive_op().end(0, 0, Outcome::Permanent);
        assert_eq!(
            report.metrics().operations(report.labels(), Outcome::Dropped),
            1
        );
    }

    #[test]
    fn test_registry_encoding() {
        let report = report();
        let mut registry = Registry::default();
        report.metrics().register(&mut registry);
        report.start_receive_op().end(1, 1, Outcome::Success);

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        assert!(out.contains("receiver_accepted_metric_points_total"));
        assert!(out.contains("receiver=\"http_size\""));
        assert!(out.contains("outcome=\"Success\""));
    }
}
