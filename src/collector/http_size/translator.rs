//! Response size to canonical metric.

use chrono::{DateTime, Utc};

use crate::collector::Translator;
use crate::model::{Metric, MetricBatch, MetricPoint, MetricSeries, MetricType, ModelError};

/// Name of the produced metric.
pub const METRIC_NAME: &str = "httpResponseSize";

/// Fixed label pairs carried by the single series.
pub const LABELS: [(&str, &str); 2] = [("label1", "A1"), ("label2", "L2")];

/// Emits one gauge-int64 metric with one series and one point per response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSizeTranslator;

impl Translator for ResponseSizeTranslator {
    type Input = i64;

    fn translate(&self, size: i64, now: DateTime<Utc>) -> Result<MetricBatch, ModelError> {
        let keys = LABELS.iter().map(|(k, _)| (*k).to_string()).collect();
        let values = LABELS.iter().map(|(_, v)| (*v).to_string()).collect();

        let metric = Metric::new(METRIC_NAME, MetricType::GaugeInt64, keys)?
            .with_series(MetricSeries::new(values).with_point(MetricPoint::int64(now, size)))?;
        Ok(MetricBatch::from(vec![metric]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointValue;
    use chrono::TimeZone;

    #[test]
    fn test_translate_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let batch = ResponseSizeTranslator.translate(20, now).unwrap();

        assert_eq!(batch.counts(), (1, 1));
        let metric = &batch.metrics()[0];
        assert_eq!(metric.name(), "httpResponseSize");
        assert_eq!(metric.metric_type(), MetricType::GaugeInt64);
        assert_eq!(metric.label_keys(), ["label1", "label2"]);

        let series = &metric.series()[0];
        assert_eq!(series.label_values, ["A1", "L2"]);
        assert_eq!(series.points[0].value, PointValue::Int64(20));
        assert_eq!(series.points[0].timestamp, now);
    }

    #[test]
    fn test_zero_size_passes_through() {
        let batch = ResponseSizeTranslator.translate(0, Utc::now()).unwrap();
        assert_eq!(
            batch.metrics()[0].series()[0].points[0].value,
            PointValue::Int64(0)
        );
    }
}
