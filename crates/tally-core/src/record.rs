//! Immutable point-in-time snapshots of one series.

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::aggregator::{AggregatorKind, AggregatorValue};
use crate::instrument::{InstrumentDescriptor, InstrumentKind};

/// One series' aggregated value at collection time.
///
/// Records own a copy of the aggregated value; later updates to the
/// instrument never show through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    descriptor: Arc<InstrumentDescriptor>,
    labels: String,
    aggregator: AggregatorKind,
    value: AggregatorValue,
    timestamp: SystemTime,
}

impl Record {
    pub fn new(
        descriptor: Arc<InstrumentDescriptor>,
        labels: impl Into<String>,
        value: AggregatorValue,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            descriptor,
            labels: labels.into(),
            aggregator: value.kind(),
            value,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn description(&self) -> &str {
        self.descriptor.description()
    }

    pub fn unit(&self) -> &str {
        self.descriptor.unit()
    }

    pub fn instrument_kind(&self) -> InstrumentKind {
        self.descriptor.kind()
    }

    pub fn descriptor(&self) -> &Arc<InstrumentDescriptor> {
        &self.descriptor
    }

    /// Canonical label string of the series.
    pub fn labels(&self) -> &str {
        &self.labels
    }

    pub fn aggregator_kind(&self) -> AggregatorKind {
        self.aggregator
    }

    pub fn value(&self) -> &AggregatorValue {
        &self.value
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Same series and timestamp, different value.
    pub fn with_value(&self, value: AggregatorValue) -> Self {
        Self::new(
            Arc::clone(&self.descriptor),
            self.labels.clone(),
            value,
            self.timestamp,
        )
    }
}
