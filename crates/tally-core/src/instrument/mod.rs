//! Instruments and their per-label-set bound instruments.
//!
//! An instrument is composed of an immutable [`InstrumentDescriptor`], the
//! [`Aggregation`] its series use, and a registry mapping canonical label
//! strings to [`BoundInstrument`]s. The typed handles ([`Counter`],
//! [`UpDownCounter`], [`ValueRecorder`], [`Observer`]) are thin wrappers that
//! choose which operations are exposed and which value rules apply.
//!
//! ## Bound instrument lifecycle
//!
//! ```text
//! bind(labels) ──► registry lookup-or-create ──► ref += 1 ──► handle
//! handle.add/record ──► aggregator.update
//! drop(handle) / unbind() ──► ref -= 1
//! Meter::collect ──► drain every series ──► remove series with ref == 0
//!                                           and nothing recorded since
//! ```

mod bound;
mod observer;
mod sync;

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use serde::Serialize;

pub use bound::{BoundCounter, BoundInstrument, BoundUpDownCounter, BoundValueRecorder};
pub(crate) use observer::callback as observer_callback;
pub use observer::{Observer, ObserverResult};
pub use sync::{Counter, UpDownCounter, ValueRecorder};

use crate::aggregator::{Aggregation, Aggregator};
use crate::error::{Error, Result};
use crate::labels::LabelSet;
use crate::number::{Number, NumberKind};
use crate::record::Record;

/// The kinds of instrument a meter can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Synchronous, monotonic sum.
    Counter,
    /// Synchronous, non-monotonic sum.
    UpDownCounter,
    /// Synchronous distribution of values.
    ValueRecorder,
    /// Asynchronous, monotonic sum.
    SumObserver,
    /// Asynchronous, non-monotonic sum.
    UpDownSumObserver,
    /// Asynchronous distribution of values.
    ValueObserver,
}

impl InstrumentKind {
    /// Whether values are pushed by application code rather than pulled by callback.
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::UpDownCounter | InstrumentKind::ValueRecorder
        )
    }

    /// Whether negative values are rejected.
    pub fn is_monotonic(&self) -> bool {
        matches!(self, InstrumentKind::Counter | InstrumentKind::SumObserver)
    }

    /// Aggregation used unless the caller picks one.
    pub fn default_aggregation(&self) -> Aggregation {
        match self {
            InstrumentKind::Counter
            | InstrumentKind::UpDownCounter
            | InstrumentKind::SumObserver
            | InstrumentKind::UpDownSumObserver => Aggregation::Sum,
            InstrumentKind::ValueRecorder | InstrumentKind::ValueObserver => {
                Aggregation::MinMaxSumCount
            }
        }
    }
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::Counter => write!(f, "counter"),
            InstrumentKind::UpDownCounter => write!(f, "up_down_counter"),
            InstrumentKind::ValueRecorder => write!(f, "value_recorder"),
            InstrumentKind::SumObserver => write!(f, "sum_observer"),
            InstrumentKind::UpDownSumObserver => write!(f, "up_down_sum_observer"),
            InstrumentKind::ValueObserver => write!(f, "value_observer"),
        }
    }
}

/// Immutable identity of an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentDescriptor {
    name: String,
    description: String,
    unit: String,
    kind: InstrumentKind,
    number_kind: NumberKind,
    enabled: bool,
}

impl InstrumentDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        kind: InstrumentKind,
        number_kind: NumberKind,
        enabled: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            kind,
            number_kind,
            enabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }

    /// Disabled instruments accept calls but record nothing.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Callback registered by an asynchronous instrument.
pub(crate) type ObserverCallback = Box<dyn Fn(&InstrumentCore) + Send + Sync>;

/// State shared by every handle of one instrument.
pub(crate) struct InstrumentCore {
    descriptor: Arc<InstrumentDescriptor>,
    aggregation: Aggregation,
    bound: DashMap<String, Arc<BoundInstrument>>,
    callback: Option<ObserverCallback>,
}

impl InstrumentCore {
    pub(crate) fn new(
        descriptor: InstrumentDescriptor,
        aggregation: Aggregation,
        callback: Option<ObserverCallback>,
    ) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            aggregation,
            bound: DashMap::new(),
            callback,
        }
    }

    pub(crate) fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    /// Check a value against this instrument's rules without recording it.
    pub(crate) fn validate(&self, value: Number) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "{} {}: value must be finite, got {value}",
                self.descriptor.kind, self.descriptor.name
            )));
        }
        if self.descriptor.kind.is_monotonic() && value.is_negative() {
            return Err(Error::InvalidArgument(format!(
                "{} {}: updates must be non-negative, got {value}",
                self.descriptor.kind, self.descriptor.name
            )));
        }
        Ok(())
    }

    /// Resolve the series for `labels`, creating it if needed, and take a reference.
    pub(crate) fn bind(&self, labels: &LabelSet) -> Arc<BoundInstrument> {
        if let Some(existing) = self.bound.get(labels.canonical()) {
            existing.inc_ref();
            return Arc::clone(existing.value());
        }

        // The entry guard holds the shard lock, so concurrent binds of a new
        // label set agree on a single series.
        let entry = self
            .bound
            .entry(labels.canonical().to_owned())
            .or_insert_with(|| {
                tracing::trace!(
                    instrument = %self.descriptor.name,
                    labels = %labels,
                    "creating bound instrument"
                );
                Arc::new(BoundInstrument::new(
                    labels.clone(),
                    Aggregator::new(&self.aggregation, self.descriptor.number_kind),
                ))
            });
        entry.inc_ref();
        Arc::clone(entry.value())
    }

    /// Validate, then bind, update and unbind in one call.
    pub(crate) fn record(&self, value: Number, labels: &LabelSet) -> Result<()> {
        self.validate(value)?;
        self.record_validated(value, labels);
        Ok(())
    }

    pub(crate) fn record_validated(&self, value: Number, labels: &LabelSet) {
        if !self.descriptor.enabled {
            return;
        }
        let bound = self.bind(labels);
        bound.update(value);
        bound.dec_ref();
    }

    /// Snapshot of the live series, ordered by canonical labels.
    pub(crate) fn bound_instruments(&self) -> Vec<Arc<BoundInstrument>> {
        let mut bound: Vec<Arc<BoundInstrument>> = self
            .bound
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        bound.sort_by(|a, b| a.labels().canonical().cmp(b.labels().canonical()));
        bound
    }

    /// Run the callback (if any), drain every series into `out`, then drop
    /// series that are unreferenced and received nothing after the drain.
    pub(crate) fn collect(&self, timestamp: SystemTime, out: &mut Vec<Record>) {
        if !self.descriptor.enabled {
            return;
        }

        if let Some(callback) = &self.callback {
            callback(self);
        }

        for entry in self.bound.iter() {
            let value = entry.aggregator().drain();
            out.push(Record::new(
                Arc::clone(&self.descriptor),
                entry.labels().canonical(),
                value,
                timestamp,
            ));
        }

        let before = self.bound.len();
        self.bound
            .retain(|_, bound| bound.get_ref() > 0 || bound.aggregator().has_updates());
        let removed = before.saturating_sub(self.bound.len());
        if removed > 0 {
            tracing::trace!(
                instrument = %self.descriptor.name,
                removed,
                "removed stale bound instruments"
            );
        }
    }
}

/// One value destined for one instrument, applied through [`Meter::record_batch`].
///
/// [`Meter::record_batch`]: crate::meter::Meter::record_batch
#[derive(Clone)]
pub struct Measurement {
    pub(crate) instrument: Arc<InstrumentCore>,
    pub(crate) value: Number,
}

impl Measurement {
    pub(crate) fn new(instrument: Arc<InstrumentCore>, value: Number) -> Self {
        Self { instrument, value }
    }

    /// Name of the target instrument.
    pub fn instrument_name(&self) -> &str {
        self.instrument.descriptor().name()
    }

    pub fn value(&self) -> Number {
        self.value
    }
}

impl std::fmt::Debug for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Measurement")
            .field("instrument", &self.instrument.descriptor().name())
            .field("value", &self.value)
            .finish()
    }
}
