//! The meter: instrument registry and collection entry point.

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::aggregator::Aggregation;
use crate::error::{Error, Result};
use crate::instrument::{
    observer_callback, Counter, InstrumentCore, InstrumentDescriptor, InstrumentKind,
    Measurement, Observer, ObserverCallback, ObserverResult, UpDownCounter, ValueRecorder,
};
use crate::labels::LabelSet;
use crate::number::MeasurementValue;
use crate::record::Record;

/// Owns every instrument created under one name.
pub struct Meter {
    name: String,
    instruments: DashMap<String, Arc<InstrumentCore>>,
}

impl Meter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruments: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the registered instruments, sorted.
    pub fn instrument_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .instruments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn register(
        &self,
        descriptor: InstrumentDescriptor,
        aggregation: Aggregation,
        callback: Option<ObserverCallback>,
    ) -> Result<Arc<InstrumentCore>> {
        if descriptor.name().is_empty() {
            return Err(Error::InvalidArgument(
                "instrument name must not be empty".to_string(),
            ));
        }
        aggregation.validate()?;

        match self.instruments.entry(descriptor.name().to_owned()) {
            Entry::Occupied(_) => Err(Error::DuplicateInstrument(descriptor.name().to_owned())),
            Entry::Vacant(vacant) => {
                tracing::debug!(
                    meter = %self.name,
                    instrument = %descriptor.name(),
                    kind = %descriptor.kind(),
                    aggregation = %aggregation.kind(),
                    "registered instrument"
                );
                let core = Arc::new(InstrumentCore::new(descriptor, aggregation, callback));
                vacant.insert(Arc::clone(&core));
                Ok(core)
            }
        }
    }

    fn descriptor<T: MeasurementValue>(
        kind: InstrumentKind,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
    ) -> InstrumentDescriptor {
        InstrumentDescriptor::new(name, description, unit, kind, T::KIND, enabled)
    }

    pub fn new_counter<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
    ) -> Result<Counter<T>> {
        let kind = InstrumentKind::Counter;
        let descriptor = Self::descriptor::<T>(kind, name, description, unit, enabled);
        self.register(descriptor, kind.default_aggregation(), None)
            .map(Counter::new)
    }

    pub fn new_up_down_counter<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
    ) -> Result<UpDownCounter<T>> {
        let kind = InstrumentKind::UpDownCounter;
        let descriptor = Self::descriptor::<T>(kind, name, description, unit, enabled);
        self.register(descriptor, kind.default_aggregation(), None)
            .map(UpDownCounter::new)
    }

    /// Value recorder aggregated as min/max/sum/count.
    pub fn new_value_recorder<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
    ) -> Result<ValueRecorder<T>> {
        self.new_value_recorder_with_aggregation(
            name,
            description,
            unit,
            enabled,
            InstrumentKind::ValueRecorder.default_aggregation(),
        )
    }

    /// Value recorder with an explicit aggregation, e.g. a histogram.
    pub fn new_value_recorder_with_aggregation<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
        aggregation: Aggregation,
    ) -> Result<ValueRecorder<T>> {
        if matches!(aggregation, Aggregation::Sum) {
            return Err(Error::InvalidArgument(format!(
                "value recorder {name} cannot use a sum aggregation"
            )));
        }
        let descriptor =
            Self::descriptor::<T>(InstrumentKind::ValueRecorder, name, description, unit, enabled);
        self.register(descriptor, aggregation, None)
            .map(ValueRecorder::new)
    }

    pub fn new_sum_observer<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
        callback: impl Fn(&ObserverResult<'_, T>) + Send + Sync + 'static,
    ) -> Result<Observer<T>> {
        self.new_observer(InstrumentKind::SumObserver, name, description, unit, enabled, callback)
    }

    pub fn new_up_down_sum_observer<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
        callback: impl Fn(&ObserverResult<'_, T>) + Send + Sync + 'static,
    ) -> Result<Observer<T>> {
        self.new_observer(
            InstrumentKind::UpDownSumObserver,
            name,
            description,
            unit,
            enabled,
            callback,
        )
    }

    pub fn new_value_observer<T: MeasurementValue>(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
        callback: impl Fn(&ObserverResult<'_, T>) + Send + Sync + 'static,
    ) -> Result<Observer<T>> {
        self.new_observer(InstrumentKind::ValueObserver, name, description, unit, enabled, callback)
    }

    fn new_observer<T: MeasurementValue>(
        &self,
        kind: InstrumentKind,
        name: &str,
        description: &str,
        unit: &str,
        enabled: bool,
        callback: impl Fn(&ObserverResult<'_, T>) + Send + Sync + 'static,
    ) -> Result<Observer<T>> {
        let descriptor = Self::descriptor::<T>(kind, name, description, unit, enabled);
        self.register(
            descriptor,
            kind.default_aggregation(),
            Some(observer_callback::<T, _>(callback)),
        )
        .map(Observer::new)
    }

    /// Snapshot every live series into records.
    ///
    /// Observer callbacks run first. Each series' live value is moved into its
    /// record, so every update is reported by exactly one collection. Records
    /// are ordered by instrument name, then labels, and share one timestamp.
    pub fn collect(&self) -> Vec<Record> {
        let mut instruments: Vec<Arc<InstrumentCore>> = self
            .instruments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        instruments.sort_by(|a, b| a.descriptor().name().cmp(b.descriptor().name()));

        let timestamp = SystemTime::now();
        let mut records = Vec::new();
        // Registry guards are released above; callbacks may touch this meter.
        for instrument in &instruments {
            instrument.collect(timestamp, &mut records);
        }
        records.sort_by(|a, b| (a.name(), a.labels()).cmp(&(b.name(), b.labels())));

        tracing::debug!(
            meter = %self.name,
            instruments = instruments.len(),
            records = records.len(),
            "collected"
        );
        records
    }

    /// Apply one value to each measurement's instrument under a shared label set.
    ///
    /// Every measurement is checked first (it must belong to this meter and
    /// satisfy its instrument's value rules); on any failure nothing is applied.
    pub fn record_batch(&self, labels: &LabelSet, measurements: &[Measurement]) -> Result<()> {
        for measurement in measurements {
            let name = measurement.instrument_name();
            let owned = self
                .instruments
                .get(name)
                .map(|registered| Arc::ptr_eq(registered.value(), &measurement.instrument))
                .unwrap_or(false);
            if !owned {
                return Err(Error::UnknownInstrument {
                    meter: self.name.clone(),
                    instrument: name.to_owned(),
                });
            }
            measurement.instrument.validate(measurement.value)?;
        }

        for measurement in measurements {
            measurement
                .instrument
                .record_validated(measurement.value, labels);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("name", &self.name)
            .field("instruments", &self.instruments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorValue;
    use crate::number::Number;

    fn labels() -> LabelSet {
        LabelSet::from([("key", "value")])
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let meter = Meter::new("test");
        meter.new_counter::<i64>("requests", "", "1", true).unwrap();

        let err = meter
            .new_value_recorder::<f64>("requests", "", "ms", true)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstrument(name) if name == "requests"));

        let err = meter
            .new_sum_observer::<i64>("requests", "", "1", true, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstrument(_)));
        assert_eq!(meter.instrument_names(), vec!["requests".to_string()]);
    }

    #[test]
    fn test_invalid_registrations() {
        let meter = Meter::new("test");
        assert!(matches!(
            meter.new_counter::<i64>("", "", "1", true),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            meter.new_value_recorder_with_aggregation::<f64>(
                "bad",
                "",
                "1",
                true,
                Aggregation::Sketch { relative_accuracy: 0.0 }
            ),
            Err(Error::InvalidArgument(_))
        ));
        assert!(meter.instrument_names().is_empty());
    }

    #[test]
    fn test_collect_counter_scenario() {
        let meter = Meter::new("test");
        let counter = meter.new_counter::<i64>("requests", "served", "1", true).unwrap();
        counter.add(5, &labels()).unwrap();

        let records = meter.collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "requests");
        assert_eq!(records[0].labels(), "key:value,");
        assert_eq!(records[0].value(), &AggregatorValue::Sum(Number::I64(5)));
    }

    #[test]
    fn test_collect_drains_and_orders() {
        let meter = Meter::new("test");
        let b = meter.new_counter::<i64>("b", "", "1", true).unwrap();
        let a = meter.new_up_down_counter::<i64>("a", "", "1", true).unwrap();
        b.add(1, &LabelSet::from([("x", "2")])).unwrap();
        b.add(1, &LabelSet::from([("x", "1")])).unwrap();
        a.add(-3, &labels()).unwrap();

        let records = meter.collect();
        let keys: Vec<_> = records.iter().map(|r| (r.name(), r.labels())).collect();
        assert_eq!(keys, vec![("a", "key:value,"), ("b", "x:1,"), ("b", "x:2,")]);
        assert!(records.windows(2).all(|w| w[0].timestamp() == w[1].timestamp()));

        // Drained: nothing recorded since, and no handle holds the series.
        assert!(meter.collect().is_empty());
        assert!(b.bound_instruments().is_empty());
    }

    #[test]
    fn test_record_is_a_copy() {
        let meter = Meter::new("test");
        let counter = meter.new_counter::<i64>("hits", "", "1", true).unwrap();
        let bound = counter.bind(&labels());
        bound.add(2).unwrap();

        let records = meter.collect();
        bound.add(40).unwrap();
        assert_eq!(records[0].value(), &AggregatorValue::Sum(Number::I64(2)));
    }

    #[test]
    fn test_bound_series_survive_collect_while_referenced() {
        let meter = Meter::new("test");
        let counter = meter.new_counter::<i64>("hits", "", "1", true).unwrap();
        let bound = counter.bind(&labels());

        // Referenced series are reported even when idle.
        let records = meter.collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value(), &AggregatorValue::Sum(Number::I64(0)));
        assert_eq!(counter.bound_instruments().len(), 1);

        drop(bound);
        assert_eq!(meter.collect().len(), 1);
        assert!(counter.bound_instruments().is_empty());
    }

    #[test]
    fn test_record_batch() {
        let meter = Meter::new("test");
        let counter = meter.new_counter::<i64>("count", "", "1", true).unwrap();
        let recorder = meter.new_value_recorder::<f64>("latency", "", "ms", true).unwrap();

        meter
            .record_batch(
                &labels(),
                &[counter.measurement(3), recorder.measurement(12.5)],
            )
            .unwrap();

        let records = meter.collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name(), "count");
        assert_eq!(records[0].value(), &AggregatorValue::Sum(Number::I64(3)));
        assert_eq!(records[1].name(), "latency");
    }

    #[test]
    fn test_record_batch_is_all_or_nothing() {
        let meter = Meter::new("test");
        let counter = meter.new_counter::<i64>("count", "", "1", true).unwrap();
        let gauge = meter.new_up_down_counter::<i64>("gauge", "", "1", true).unwrap();

        let err = meter
            .record_batch(&labels(), &[gauge.measurement(4), counter.measurement(-1)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(meter.collect().is_empty());

        let other = Meter::new("other");
        let foreign = other.new_counter::<i64>("count", "", "1", true).unwrap();
        let err = meter
            .record_batch(&labels(), &[gauge.measurement(4), foreign.measurement(1)])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInstrument { .. }));
        assert!(meter.collect().is_empty());
    }
}
