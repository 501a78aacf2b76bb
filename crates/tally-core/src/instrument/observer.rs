//! Asynchronous instruments, driven by a callback once per collection.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{BoundInstrument, InstrumentCore, InstrumentDescriptor, ObserverCallback};
use crate::error::Result;
use crate::labels::LabelSet;
use crate::number::MeasurementValue;

/// Capability handed to an observer callback for the duration of one call.
///
/// The borrow ties it to the callback invocation; it cannot be retained.
pub struct ObserverResult<'a, T> {
    instrument: &'a InstrumentCore,
    _marker: PhantomData<T>,
}

impl<'a, T: MeasurementValue> ObserverResult<'a, T> {
    fn new(instrument: &'a InstrumentCore) -> Self {
        Self {
            instrument,
            _marker: PhantomData,
        }
    }

    /// Report `value` for the series identified by `labels`.
    pub fn observe(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.instrument.record(value.into(), labels)
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        self.instrument.descriptor()
    }
}

/// Wrap a typed callback into the untyped form stored on the instrument.
pub(crate) fn callback<T, F>(f: F) -> ObserverCallback
where
    T: MeasurementValue,
    F: Fn(&ObserverResult<'_, T>) + Send + Sync + 'static,
{
    Box::new(move |core: &InstrumentCore| f(&ObserverResult::new(core)))
}

/// A sum observer, up-down sum observer or value observer.
///
/// The kind is fixed by the [`Meter`](crate::Meter) constructor that created it.
#[derive(Clone)]
pub struct Observer<T> {
    core: Arc<InstrumentCore>,
    _marker: PhantomData<T>,
}

impl<T: MeasurementValue> Observer<T> {
    pub(crate) fn new(core: Arc<InstrumentCore>) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        self.core.descriptor()
    }

    /// Report a value outside the callback. Applied like a synchronous update.
    pub fn observe(&self, value: T, labels: &LabelSet) -> Result<()> {
        self.core.record(value.into(), labels)
    }

    pub fn bound_instruments(&self) -> Vec<Arc<BoundInstrument>> {
        self.core.bound_instruments()
    }
}


impl<T> std::fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("name", &self.core.descriptor().name())
            .finish()
    }
}
