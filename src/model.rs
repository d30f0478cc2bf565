//! Canonical metric model.
//!
//! The in-memory representation every source produces and every consumer
//! accepts. It is independent of any wire format.
//!
//! - [`Metric`]: descriptor (name, type, label keys) plus its series
//! - [`MetricSeries`]: label values aligned with the metric's label keys
//! - [`MetricPoint`]: timestamped int64 or double value
//! - [`MetricBatch`]: the output of one collection tick
//!
//! Constructors on [`Metric`] enforce two invariants: every series carries
//! exactly as many label values as the metric has label keys, and every
//! point matches the value kind implied by the metric type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors raised when a metric would violate the model invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Series label values do not line up with the metric's label keys.
    #[error("metric '{metric}': series has {values} label values but metric declares {keys} label keys")]
    LabelMismatch {
        metric: String,
        keys: usize,
        values: usize,
    },

    /// A point's value kind does not match the metric type.
    #[error("metric '{metric}': {found} point in a {metric_type} metric")]
    ValueKindMismatch {
        metric: String,
        metric_type: MetricType,
        found: ValueKind,
    },

    /// Metric name is empty.
    #[error("metric name cannot be empty")]
    EmptyName,
}

/// Primitive kind carried by a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Int64,
    Double,
}

/// Metric descriptor type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MetricType {
    /// Instantaneous integer measurement.
    GaugeInt64,
    /// Instantaneous floating point measurement.
    GaugeDouble,
    /// Monotonic integer counter.
    CumulativeInt64,
    /// Monotonic floating point counter.
    CumulativeDouble,
}

impl MetricType {
    /// Value kind every point of this type must carry.
    pub fn value_kind(self) -> ValueKind {
        match self {
            Self::GaugeInt64 | Self::CumulativeInt64 => ValueKind::Int64,
            Self::GaugeDouble | Self::CumulativeDouble => ValueKind::Double,
        }
    }
}

/// Point value: int64 or double, never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointValue {
    Int64(i64),
    Double(f64),
}

impl PointValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int64(_) => ValueKind::Int64,
            Self::Double(_) => ValueKind::Double,
        }
    }
}

/// A single timestamped observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: PointValue,
}

impl MetricPoint {
    pub fn int64(timestamp: DateTime<Utc>, value: i64) -> Self {
        Self {
            timestamp,
            value: PointValue::Int64(value),
        }
    }

    pub fn double(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value: PointValue::Double(value),
        }
    }
}

/// One time series: label values (positional) plus chronological points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSeries {
    pub label_values: Vec<String>,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn new(label_values: Vec<String>) -> Self {
        Self {
            label_values,
            points: Vec::new(),
        }
    }

    /// Append a point.
    pub fn with_point(mut self, point: MetricPoint) -> Self {
        self.points.push(point);
        self
    }
}

/// A metric descriptor together with its series.
///
/// Fields are private so that the label/value invariants cannot be bypassed;
/// use [`Metric::new`] and [`Metric::push_series`]. Deserialization goes
/// through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetric")]
pub struct Metric {
    name: String,
    metric_type: MetricType,
    label_keys: Vec<String>,
    series: Vec<MetricSeries>,
}

/// Unchecked wire form of [`Metric`].
#[derive(Deserialize)]
struct RawMetric {
    name: String,
    metric_type: MetricType,
    #[serde(default)]
    label_keys: Vec<String>,
    #[serde(default)]
    series: Vec<MetricSeries>,
}

impl TryFrom<RawMetric> for Metric {
    type Error = ModelError;

    fn try_from(raw: RawMetric) -> Result<Self, ModelError> {
        let mut metric = Metric::new(raw.name, raw.metric_type, raw.label_keys)?;
        for series in raw.series {
            metric.push_series(series)?;
        }
        Ok(metric)
    }
}

impl Metric {
    /// Create an empty metric.
    ///
    /// # Errors
    /// Returns [`ModelError::EmptyName`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        label_keys: Vec<String>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        Ok(Self {
            name,
            metric_type,
            label_keys,
            series: Vec::new(),
        })
    }

    /// Add a series after checking it against the descriptor.
    ///
    /// # Errors
    /// Returns [`ModelError::LabelMismatch`] or [`ModelError::ValueKindMismatch`].
    pub fn push_series(&mut self, series: MetricSeries) -> Result<(), ModelError> {
        if series.label_values.len() != self.label_keys.len() {
            return Err(ModelError::LabelMismatch {
                metric: self.name.clone(),
                keys: self.label_keys.len(),
                values: series.label_values.len(),
            });
        }
        let expected = self.metric_type.value_kind();
        if let Some(bad) = series.points.iter().find(|p| p.value.kind() != expected) {
            return Err(ModelError::ValueKindMismatch {
                metric: self.name.clone(),
                metric_type: self.metric_type,
                found: bad.value.kind(),
            });
        }
        self.series.push(series);
        Ok(())
    }

    /// Builder form of [`Metric::push_series`].
    pub fn with_series(mut self, series: MetricSeries) -> Result<Self, ModelError> {
        self.push_series(series)?;
        Ok(self)
    }

    /// Append a label to the descriptor and a matching value to every series.
    ///
    /// If the key already exists its value is overwritten in every series.
    pub fn upsert_label(&mut self, key: &str, value: &str) {
        match self.label_keys.iter().position(|k| k == key) {
            Some(idx) => {
                let width = self.label_keys.len();
                for series in &mut self.series {
                    series.label_values.resize(width, String::new());
                    series.label_values[idx] = value.to_string();
                }
            }
            None => {
                self.label_keys.push(key.to_string());
                for series in &mut self.series {
                    series.label_values.push(value.to_string());
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    pub fn series(&self) -> &[MetricSeries] {
        &self.series
    }

    /// Total number of points across all series.
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Ordered metrics produced by one collection tick.
///
/// Passed by value into [`crate::consumer::MetricsConsumer::consume`]; the
/// producer gives up ownership on hand-off.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricBatch {
    metrics: Vec<Metric>,
}

impl MetricBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut [Metric] {
        &mut self.metrics
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Count `(series, points)` across the batch.
    pub fn counts(&self) -> (usize, usize) {
        self.metrics.iter().fold((0, 0), |(series, points), m| {
            (series + m.series.len(), points + m.point_count())
        })
    }
}

impl From<Vec<Metric>> for MetricBatch {
    fn from(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }
}

impl FromIterator<Metric> for MetricBatch {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}
