//! Exporter writing checkpoints to a byte sink (stdout in the binary).

use std::io::Write;
use std::time::{Duration, UNIX_EPOCH};

use clap::ValueEnum;
use tally_core::{AggregatorValue, Exporter, Record};

/// Output format for exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per record
    Text,
    /// One JSON object per record
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Writes every exported batch to `writer`.
pub struct StreamExporter<W> {
    format: OutputFormat,
    writer: W,
    batches: u64,
}

impl<W: Write + Send> StreamExporter<W> {
    pub fn new(format: OutputFormat, writer: W) -> Self {
        Self {
            format,
            writer,
            batches: 0,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_batch(&mut self, records: &[Record]) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.writer, "--- export #{} ({} records)", self.batches, records.len())?;
                for record in records {
                    writeln!(self.writer, "{}", format_text(record))?;
                }
            }
            OutputFormat::Json => {
                for record in records {
                    serde_json::to_writer(&mut self.writer, record)?;
                    writeln!(self.writer)?;
                }
            }
        }
        self.writer.flush()
    }
}

impl<W: Write + Send> Exporter for StreamExporter<W> {
    fn export(&mut self, records: &[Record], _timeout: Duration) -> tally_core::Result<()> {
        self.batches += 1;
        self.write_batch(records)
            .map_err(|e| tally_core::Error::Export(e.to_string()))
    }
}

/// `name{labels} kind value @ millis`.
pub fn format_text(record: &Record) -> String {
    let millis = record
        .timestamp()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!(
        "{}{{{}}} {} {} @ {}",
        record.name(),
        record.labels().trim_end_matches(','),
        record.aggregator_kind(),
        format_value(record.value()),
        millis
    )
}

fn format_value(value: &AggregatorValue) -> String {
    match value {
        AggregatorValue::Sum(sum) => sum.to_string(),
        AggregatorValue::MinMaxSumCount(m) if m.is_empty() => "count=0".to_string(),
        AggregatorValue::MinMaxSumCount(m) => {
            format!("min={} max={} sum={} count={}", m.min, m.max, m.sum, m.count)
        }
        AggregatorValue::Histogram(h) => {
            let buckets: Vec<String> = h
                .boundaries()
                .iter()
                .map(|b| format!("<{b}"))
                .chain(std::iter::once("+inf".to_string()))
                .zip(h.counts())
                .map(|(bound, count)| format!("{bound}:{count}"))
                .collect();
            format!("sum={} count={} [{}]", h.sum(), h.count(), buckets.join(" "))
        }
        AggregatorValue::Sketch(s) => match s.quantile(0.5) {
            Some(p50) => format!(
                "sum={} count={} p50={p50:.3} p99={:.3}",
                s.sum(),
                s.count(),
                s.quantile(0.99).unwrap_or(p50)
            ),
            None => "count=0".to_string(),
        },
    }
}
