//! Processors: fold one collection's records into per-series checkpoints.
//!
//! ```text
//! collect ──► process(record)* ──► checkpoint_self() ──► finished_collection()
//!                 │                      │
//!                 ▼                      ▼
//!          per-series aggregator   stateless: this cycle only
//!          (merge same series)     stateful:  cumulative since creation
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::aggregator::{Aggregator, AggregatorValue};
use crate::error::Result;
use crate::instrument::InstrumentDescriptor;
use crate::record::Record;

/// Consumer of collected records. Driven by one thread at a time.
pub trait Processor: Send {
    /// Merge one record into the entry for its series.
    fn process(&mut self, record: Record) -> Result<()>;

    /// Checkpoint every tracked series and return one record per series to export.
    fn checkpoint_self(&mut self) -> Vec<Record>;

    /// End-of-cycle bookkeeping.
    fn finished_collection(&mut self);
}

/// Whether checkpoints reset every cycle or accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorMode {
    /// Each checkpoint holds only the records of the current cycle.
    #[default]
    Stateless,
    /// Each checkpoint holds everything since the processor was created.
    Stateful,
}

impl From<bool> for ProcessorMode {
    fn from(stateful: bool) -> Self {
        if stateful {
            ProcessorMode::Stateful
        } else {
            ProcessorMode::Stateless
        }
    }
}

impl std::fmt::Display for ProcessorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorMode::Stateless => write!(f, "stateless"),
            ProcessorMode::Stateful => write!(f, "stateful"),
        }
    }
}

struct Series {
    descriptor: Arc<InstrumentDescriptor>,
    timestamp: SystemTime,
    /// Records merged during the current cycle.
    current: Aggregator,
    /// Stateful mode only: every checkpoint so far.
    cumulative: Option<AggregatorValue>,
    updated: bool,
}

/// Processor keyed by (instrument name, canonical labels), with no label
/// reduction.
pub struct UngroupedProcessor {
    mode: ProcessorMode,
    series: BTreeMap<(String, String), Series>,
}

impl UngroupedProcessor {
    pub fn new(mode: ProcessorMode) -> Self {
        Self {
            mode,
            series: BTreeMap::new(),
        }
    }

    pub fn stateless() -> Self {
        Self::new(ProcessorMode::Stateless)
    }

    pub fn stateful() -> Self {
        Self::new(ProcessorMode::Stateful)
    }

    pub fn mode(&self) -> ProcessorMode {
        self.mode
    }

    /// Number of series currently tracked.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

impl Processor for UngroupedProcessor {
    fn process(&mut self, record: Record) -> Result<()> {
        let key = (record.name().to_owned(), record.labels().to_owned());
        let mode = self.mode;
        let series = self.series.entry(key).or_insert_with(|| Series {
            descriptor: Arc::clone(record.descriptor()),
            timestamp: record.timestamp(),
            current: Aggregator::like(record.value()),
            cumulative: match mode {
                ProcessorMode::Stateful => Some(record.value().identity()),
                ProcessorMode::Stateless => None,
            },
            updated: false,
        });

        series.current.merge_value(record.value())?;
        series.timestamp = series.timestamp.max(record.timestamp());
        series.updated = true;
        Ok(())
    }

    fn checkpoint_self(&mut self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.series.len());

        for ((name, labels), series) in &mut self.series {
            series.current.checkpoint();
            let delta = series.current.checkpoint_value();

            let value = match &mut series.cumulative {
                Some(total) => {
                    if let Err(e) = total.merge(&delta) {
                        tracing::warn!(
                            instrument = %name,
                            labels = %labels,
                            error = %e,
                            "dropping checkpoint that does not fit cumulative state"
                        );
                    }
                    total.clone()
                }
                None if series.updated => delta,
                None => continue,
            };

            out.push(Record::new(
                Arc::clone(&series.descriptor),
                labels.clone(),
                value,
                series.timestamp,
            ));
        }

        out
    }

    fn finished_collection(&mut self) {
        match self.mode {
            ProcessorMode::Stateless => self.series.clear(),
            ProcessorMode::Stateful => {
                for series in self.series.values_mut() {
                    series.updated = false;
                }
            }
        }
    }
}

impl std::fmt::Debug for UngroupedProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UngroupedProcessor")
            .field("mode", &self.mode)
            .field("series", &self.series.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatorKind, MinMaxSumCount};
    use crate::error::Error;
    use crate::instrument::InstrumentKind;
    use crate::number::{Number, NumberKind};

    fn descriptor(name: &str, kind: InstrumentKind) -> Arc<InstrumentDescriptor> {
        Arc::new(InstrumentDescriptor::new(name, "", "1", kind, NumberKind::I64, true))
    }

    fn sum_record(name: &str, labels: &str, value: i64) -> Record {
        Record::new(
            descriptor(name, InstrumentKind::Counter),
            labels,
            AggregatorValue::Sum(Number::I64(value)),
            SystemTime::now(),
        )
    }

    fn cycle(processor: &mut UngroupedProcessor, records: Vec<Record>) -> Vec<Record> {
        for record in records {
            processor.process(record).unwrap();
        }
        let out = processor.checkpoint_self();
        processor.finished_collection();
        out
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ProcessorMode::from(true), ProcessorMode::Stateful);
        assert_eq!(ProcessorMode::from(false), ProcessorMode::Stateless);
        assert_eq!(ProcessorMode::Stateful.to_string(), "stateful");
    }

    #[test]
    fn test_stateless_reports_each_cycle() {
        let mut processor = UngroupedProcessor::stateless();

        let first = cycle(&mut processor, vec![sum_record("hits", "k:v,", 1)]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].value(), &AggregatorValue::Sum(Number::I64(1)));
        assert_eq!(processor.series_count(), 0);

        let second = cycle(&mut processor, vec![sum_record("hits", "k:v,", 1)]);
        assert_eq!(second[0].value(), &AggregatorValue::Sum(Number::I64(1)));

        assert!(cycle(&mut processor, vec![]).is_empty());
    }

    #[test]
    fn test_stateful_accumulates() {
        let mut processor = UngroupedProcessor::stateful();

        let first = cycle(&mut processor, vec![sum_record("hits", "k:v,", 1)]);
        assert_eq!(first[0].value(), &AggregatorValue::Sum(Number::I64(1)));

        let second = cycle(&mut processor, vec![sum_record("hits", "k:v,", 1)]);
        assert_eq!(second[0].value(), &AggregatorValue::Sum(Number::I64(2)));

        // Idle series keep being reported with their total.
        let third = cycle(&mut processor, vec![]);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].value(), &AggregatorValue::Sum(Number::I64(2)));
    }

    #[test]
    fn test_stateful_min_max_spans_cycles() {
        let mut processor = UngroupedProcessor::stateful();
        let mmsc = |values: &[i64]| {
            let mut m = MinMaxSumCount::new(NumberKind::I64);
            for v in values {
                m.update(Number::I64(*v));
            }
            Record::new(
                descriptor("latency", InstrumentKind::ValueRecorder),
                "",
                AggregatorValue::MinMaxSumCount(m),
                SystemTime::now(),
            )
        };

        cycle(&mut processor, vec![mmsc(&[5, 9])]);
        let out = cycle(&mut processor, vec![mmsc(&[2])]);
        match out[0].value() {
            AggregatorValue::MinMaxSumCount(m) => {
                assert_eq!(m.min, Number::I64(2));
                assert_eq!(m.max, Number::I64(9));
                assert_eq!(m.sum, Number::I64(16));
                assert_eq!(m.count, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_same_series_records_merge() {
        let mut processor = UngroupedProcessor::stateless();
        let out = cycle(
            &mut processor,
            vec![
                sum_record("hits", "k:v,", 2),
                sum_record("hits", "k:w,", 7),
                sum_record("hits", "k:v,", 3),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].labels(), "k:v,");
        assert_eq!(out[0].value(), &AggregatorValue::Sum(Number::I64(5)));
        assert_eq!(out[1].value(), &AggregatorValue::Sum(Number::I64(7)));
    }

    #[test]
    fn test_kind_mismatch_is_reported() {
        let mut processor = UngroupedProcessor::stateless();
        processor.process(sum_record("x", "", 1)).unwrap();

        let clash = Record::new(
            descriptor("x", InstrumentKind::ValueRecorder),
            "",
            AggregatorValue::MinMaxSumCount(MinMaxSumCount::new(NumberKind::I64)),
            SystemTime::now(),
        );
        let err = processor.process(clash).unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch {
                expected: AggregatorKind::Sum,
                found: AggregatorKind::MinMaxSumCount
            }
        ));

        let out = processor.checkpoint_self();
        assert_eq!(out[0].value(), &AggregatorValue::Sum(Number::I64(1)));
    }
}
