use std::time::Duration;

use super::Exporter;
use crate::aggregator::AggregatorValue;
use crate::error::Result;
use crate::record::Record;

/// Emits one `tracing` event per record at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExporter;

impl LoggingExporter {
    pub fn new() -> Self {
        Self
    }
}

/// Short human-readable rendering of an aggregated value.
pub(crate) fn summarize(value: &AggregatorValue) -> String {
    match value {
        AggregatorValue::Sum(sum) => format!("sum={sum}"),
        AggregatorValue::MinMaxSumCount(m) if m.is_empty() => "count=0".to_string(),
        AggregatorValue::MinMaxSumCount(m) => {
            format!("min={} max={} sum={} count={}", m.min, m.max, m.sum, m.count)
        }
        AggregatorValue::Histogram(h) => {
            format!("sum={} count={} buckets={:?}", h.sum(), h.count(), h.counts())
        }
        AggregatorValue::Sketch(s) => match (s.quantile(0.5), s.quantile(0.99)) {
            (Some(p50), Some(p99)) => {
                format!("sum={} count={} p50={p50} p99={p99}", s.sum(), s.count())
            }
            _ => "count=0".to_string(),
        },
    }
}

impl Exporter for LoggingExporter {
    fn export(&mut self, records: &[Record], _timeout: Duration) -> Result<()> {
        for record in records {
            tracing::info!(
                instrument = %record.name(),
                kind = %record.instrument_kind(),
                labels = %record.labels(),
                aggregator = %record.aggregator_kind(),
                value = %summarize(record.value()),
                "metric"
            );
        }
        Ok(())
    }
}
