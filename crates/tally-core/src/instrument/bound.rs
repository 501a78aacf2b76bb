//! Bound instruments: one aggregator per (instrument, label set).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::InstrumentCore;
use crate::aggregator::Aggregator;
use crate::error::Result;
use crate::labels::LabelSet;
use crate::number::{MeasurementValue, Number};

/// A single time series: its labels, its aggregator and a reference count of
/// the handles currently bound to it.
///
/// The reference count is independent of the aggregator lock; binding and
/// unbinding never contend with updates.
#[derive(Debug)]
pub struct BoundInstrument {
    labels: LabelSet,
    aggregator: Aggregator,
    refs: AtomicUsize,
}

impl BoundInstrument {
    pub(crate) fn new(labels: LabelSet, aggregator: Aggregator) -> Self {
        Self {
            labels,
            aggregator,
            refs: AtomicUsize::new(0),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Point-in-time reference count. Diagnostic only.
    pub fn get_ref(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn inc_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_ref(&self) {
        self.refs.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn update(&self, value: Number) {
        self.aggregator.update(value);
    }
}

/// A counted reference to a bound instrument. Released on drop.
struct BoundHandle {
    instrument: Arc<InstrumentCore>,
    bound: Arc<BoundInstrument>,
}

impl BoundHandle {
    fn new(instrument: Arc<InstrumentCore>, labels: &LabelSet) -> Self {
        let bound = instrument.bind(labels);
        Self { instrument, bound }
    }

    fn record(&self, value: Number) -> Result<()> {
        self.instrument.validate(value)?;
        if self.instrument.descriptor().is_enabled() {
            self.bound.update(value);
        }
        Ok(())
    }
}

impl Clone for BoundHandle {
    fn clone(&self) -> Self {
        self.bound.inc_ref();
        Self {
            instrument: Arc::clone(&self.instrument),
            bound: Arc::clone(&self.bound),
        }
    }
}

impl Drop for BoundHandle {
    fn drop(&mut self) {
        self.bound.dec_ref();
    }
}

/// A [`Counter`](super::Counter) bound to one label set.
#[derive(Clone)]
pub struct BoundCounter<T> {
    handle: BoundHandle,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> BoundCounter<T> {
    pub(crate) fn new(instrument: Arc<InstrumentCore>, labels: &LabelSet) -> Self {
        Self {
            handle: BoundHandle::new(instrument, labels),
            _marker: PhantomData,
        }
    }

    /// Add a non-negative value to the series.
    pub fn add(&self, value: T) -> Result<()> {
        self.handle.record(value.into())
    }

    /// Alias of [`add`](Self::add).
    pub fn update(&self, value: T) -> Result<()> {
        self.add(value)
    }

    /// Release this handle.
    pub fn unbind(self) {}

    pub fn get_ref(&self) -> usize {
        self.handle.bound.get_ref()
    }

    pub fn labels(&self) -> &LabelSet {
        self.handle.bound.labels()
    }

    pub fn aggregator(&self) -> &Aggregator {
        self.handle.bound.aggregator()
    }
}

/// An [`UpDownCounter`](super::UpDownCounter) bound to one label set.
#[derive(Clone)]
pub struct BoundUpDownCounter<T> {
    handle: BoundHandle,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> BoundUpDownCounter<T> {
    pub(crate) fn new(instrument: Arc<InstrumentCore>, labels: &LabelSet) -> Self {
        Self {
            handle: BoundHandle::new(instrument, labels),
            _marker: PhantomData,
        }
    }

    /// Add a value of either sign to the series.
    pub fn add(&self, value: T) -> Result<()> {
        self.handle.record(value.into())
    }

    pub fn update(&self, value: T) -> Result<()> {
        self.add(value)
    }

    pub fn unbind(self) {}

    pub fn get_ref(&self) -> usize {
        self.handle.bound.get_ref()
    }

    pub fn labels(&self) -> &LabelSet {
        self.handle.bound.labels()
    }

    pub fn aggregator(&self) -> &Aggregator {
        self.handle.bound.aggregator()
    }
}

/// A [`ValueRecorder`](super::ValueRecorder) bound to one label set.
#[derive(Clone)]
pub struct BoundValueRecorder<T> {
    handle: BoundHandle,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> BoundValueRecorder<T> {
    pub(crate) fn new(instrument: Arc<InstrumentCore>, labels: &LabelSet) -> Self {
        Self {
            handle: BoundHandle::new(instrument, labels),
            _marker: PhantomData,
        }
    }

    /// Record one value in the series' distribution.
    pub fn record(&self, value: T) -> Result<()> {
        self.handle.record(value.into())
    }

    pub fn update(&self, value: T) -> Result<()> {
        self.record(value)
    }

    pub fn unbind(self) {}

    pub fn get_ref(&self) -> usize {
        self.handle.bound.get_ref()
    }

    pub fn labels(&self) -> &LabelSet {
        self.handle.bound.labels()
    }

    pub fn aggregator(&self) -> &Aggregator {
        self.handle.bound.aggregator()
    }
}
