//! Synchronous instruments.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    BoundCounter, BoundInstrument, BoundUpDownCounter, BoundValueRecorder, InstrumentCore,
    InstrumentDescriptor, Measurement,
};
use crate::error::Result;
use crate::labels::LabelSet;
use crate::number::MeasurementValue;

/// Monotonic sum. Negative values are rejected with
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument).
#[derive(Clone)]
pub struct Counter<T> {
    core: Arc<InstrumentCore>,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> Counter<T> {
    pub(crate) fn new(core: Arc<InstrumentCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        self.core.descriptor()
    }

    /// Add `value` to the series identified by `labels`.
    pub fn add(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.core.record(value.into(), labels)
    }

    /// Same as [`add`](Self::add): bind, update, unbind.
    pub fn update(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.add(value, labels)
    }

    /// Bind to `labels`. The returned handle keeps the series alive until dropped.
    pub fn bind(&self, labels: &LabelSet) -> BoundCounter<T> {
        BoundCounter::new(Arc::clone(&self.core), labels)
    }

    /// A measurement for [`Meter::record_batch`](crate::Meter::record_batch).
    pub fn measurement(&self, value: T) -> Measurement {
        Measurement::new(Arc::clone(&self.core), value.into())
    }

    /// Live series, ordered by labels.
    pub fn bound_instruments(&self) -> Vec<Arc<BoundInstrument>> {
        self.core.bound_instruments()
    }
}

/// Non-monotonic sum.
#[derive(Clone)]
pub struct UpDownCounter<T> {
    core: Arc<InstrumentCore>,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> UpDownCounter<T> {
    pub(crate) fn new(core: Arc<InstrumentCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        self.core.descriptor()
    }

    /// Add `value`, of either sign, to the series identified by `labels`.
    pub fn add(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.core.record(value.into(), labels)
    }

    pub fn update(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.add(value, labels)
    }

    pub fn bind(&self, labels: &LabelSet) -> BoundUpDownCounter<T> {
        BoundUpDownCounter::new(Arc::clone(&self.core), labels)
    }

    pub fn measurement(&self, value: T) -> Measurement {
        Measurement::new(Arc::clone(&self.core), value.into())
    }

    pub fn bound_instruments(&self) -> Vec<Arc<BoundInstrument>> {
        self.core.bound_instruments()
    }
}

/// Distribution of values, aggregated as min/max/sum/count unless a histogram
/// or sketch was selected at creation.
#[derive(Clone)]
pub struct ValueRecorder<T> {
    core: Arc<InstrumentCore>,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> ValueRecorder<T> {
    pub(crate) fn new(core: Arc<InstrumentCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        self.core.descriptor()
    }

    /// Record `value` in the series identified by `labels`.
    pub fn record(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.core.record(value.into(), labels)
    }

    pub fn update(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.record(value, labels)
    }

    pub fn bind(&self, labels: &LabelSet) -> BoundValueRecorder<T> {
        BoundValueRecorder::new(Arc::clone(&self.core), labels)
    }

    pub fn measurement(&self, value: T) -> Measurement {
        Measurement::new(Arc::clone(&self.core), value.into())
    }

    pub fn bound_instruments(&self) -> Vec<Arc<BoundInstrument>> {
        self.core.bound_instruments()
    }
}


impl<T> std::fmt::Debug for ValueRecorder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueRecorder")
            .field("name", &self.core.descriptor().name())
            .finish()
    }
}
