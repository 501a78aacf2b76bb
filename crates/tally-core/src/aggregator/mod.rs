//! Aggregators: lock-protected state machines that fold raw measurements
//! into summary values.
//!
//! Every [`Aggregator`] holds a *live* value, mutated by [`Aggregator::update`],
//! and a *checkpoint* value, replaced only by [`Aggregator::checkpoint`]. Both
//! sit behind one mutex, so a checkpoint is atomic with respect to concurrent
//! updates: an update racing a checkpoint lands on exactly one side of it.
//!
//! # Usage
//!
//! ```
//! use tally_core::aggregator::{Aggregator, AggregatorValue};
//! use tally_core::number::{Number, NumberKind};
//!
//! let agg = Aggregator::sum(NumberKind::I64);
//! agg.update(Number::I64(2));
//! agg.update(Number::I64(3));
//! agg.checkpoint();
//!
//! assert_eq!(agg.checkpoint_value(), AggregatorValue::Sum(Number::I64(5)));
//! assert_eq!(agg.values(), AggregatorValue::Sum(Number::I64(0)));
//! ```

mod histogram;
mod min_max_sum_count;
mod sketch;

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

pub use histogram::Histogram;
pub use min_max_sum_count::MinMaxSumCount;
pub use sketch::{Sketch, DEFAULT_RELATIVE_ACCURACY};

use crate::error::{Error, Result};
use crate::number::{Number, NumberKind};

/// The family an aggregator belongs to. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    /// Running total.
    Sum,
    /// Min, max, sum and count.
    MinMaxSumCount,
    /// Fixed-boundary bucket counts.
    Histogram,
    /// Relative-error quantile sketch.
    Sketch,
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorKind::Sum => write!(f, "sum"),
            AggregatorKind::MinMaxSumCount => write!(f, "min_max_sum_count"),
            AggregatorKind::Histogram => write!(f, "histogram"),
            AggregatorKind::Sketch => write!(f, "sketch"),
        }
    }
}

/// Aggregation selected for an instrument, including its configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Sum,
    MinMaxSumCount,
    /// Histogram over sorted ascending boundaries.
    Histogram { boundaries: Vec<f64> },
    /// Quantile sketch with the given relative accuracy in `(0, 1)`.
    Sketch { relative_accuracy: f64 },
}

impl Aggregation {
    /// Histogram aggregation. Boundaries must already be sorted.
    pub fn histogram(boundaries: impl Into<Vec<f64>>) -> Self {
        Aggregation::Histogram {
            boundaries: boundaries.into(),
        }
    }

    /// Sketch aggregation with the default accuracy.
    pub fn sketch() -> Self {
        Aggregation::Sketch {
            relative_accuracy: DEFAULT_RELATIVE_ACCURACY,
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        match self {
            Aggregation::Sum => AggregatorKind::Sum,
            Aggregation::MinMaxSumCount => AggregatorKind::MinMaxSumCount,
            Aggregation::Histogram { .. } => AggregatorKind::Histogram,
            Aggregation::Sketch { .. } => AggregatorKind::Sketch,
        }
    }

    /// Reject configurations no aggregator can be built from.
    ///
    /// Histogram boundaries are only checked for finiteness; sortedness is
    /// the caller's responsibility.
    pub fn validate(&self) -> Result<()> {
        match self {
            Aggregation::Histogram { boundaries } if boundaries.iter().any(|b| !b.is_finite()) => {
                Err(Error::InvalidArgument(
                    "histogram boundaries must be finite".to_string(),
                ))
            }
            Aggregation::Sketch { relative_accuracy }
                if !(*relative_accuracy > 0.0 && *relative_accuracy < 1.0) =>
            {
                Err(Error::InvalidArgument(format!(
                    "sketch relative accuracy must be in (0, 1), got {relative_accuracy}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// An owned aggregated value, as carried by records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AggregatorValue {
    Sum(Number),
    MinMaxSumCount(MinMaxSumCount),
    Histogram(Histogram),
    Sketch(Sketch),
}

impl AggregatorValue {
    /// The empty value for `aggregation` over `number_kind`.
    pub fn new(aggregation: &Aggregation, number_kind: NumberKind) -> Self {
        match aggregation {
            Aggregation::Sum => AggregatorValue::Sum(Number::zero(number_kind)),
            Aggregation::MinMaxSumCount => {
                AggregatorValue::MinMaxSumCount(MinMaxSumCount::new(number_kind))
            }
            Aggregation::Histogram { boundaries } => {
                AggregatorValue::Histogram(Histogram::new(boundaries.clone(), number_kind))
            }
            Aggregation::Sketch { relative_accuracy } => {
                AggregatorValue::Sketch(Sketch::new(*relative_accuracy, number_kind))
            }
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        match self {
            AggregatorValue::Sum(_) => AggregatorKind::Sum,
            AggregatorValue::MinMaxSumCount(_) => AggregatorKind::MinMaxSumCount,
            AggregatorValue::Histogram(_) => AggregatorKind::Histogram,
            AggregatorValue::Sketch(_) => AggregatorKind::Sketch,
        }
    }

    /// Apply one measurement.
    pub fn update(&mut self, value: Number) {
        match self {
            AggregatorValue::Sum(sum) => *sum = sum.add(value),
            AggregatorValue::MinMaxSumCount(mmsc) => mmsc.update(value),
            AggregatorValue::Histogram(hist) => hist.update(value),
            AggregatorValue::Sketch(sketch) => sketch.update(value),
        }
    }

    /// Fold `other` into this value.
    pub fn merge(&mut self, other: &AggregatorValue) -> Result<()> {
        match (self, other) {
            (AggregatorValue::Sum(a), AggregatorValue::Sum(b)) => {
                *a = a.add(*b);
                Ok(())
            }
            (AggregatorValue::MinMaxSumCount(a), AggregatorValue::MinMaxSumCount(b)) => {
                a.merge(b);
                Ok(())
            }
            (AggregatorValue::Histogram(a), AggregatorValue::Histogram(b)) => a.merge(b),
            (AggregatorValue::Sketch(a), AggregatorValue::Sketch(b)) => a.merge(b),
            (this, other) => Err(Error::KindMismatch {
                expected: this.kind(),
                found: other.kind(),
            }),
        }
    }

    /// Return to the identity element, keeping configuration.
    pub fn reset(&mut self) {
        match self {
            AggregatorValue::Sum(sum) => *sum = Number::zero(sum.kind()),
            AggregatorValue::MinMaxSumCount(mmsc) => mmsc.reset(),
            AggregatorValue::Histogram(hist) => hist.reset(),
            AggregatorValue::Sketch(sketch) => sketch.reset(),
        }
    }

    /// An empty value with the same kind and configuration.
    pub fn identity(&self) -> AggregatorValue {
        let mut empty = self.clone();
        empty.reset();
        empty
    }
}

struct AggregatorState {
    live: AggregatorValue,
    checkpoint: AggregatorValue,
    /// Set by updates and merges, cleared when live state is drained or checkpointed.
    dirty: bool,
}

/// A kind-fixed aggregator with live and checkpoint state.
pub struct Aggregator {
    kind: AggregatorKind,
    number_kind: NumberKind,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    /// Create an aggregator for `aggregation` over `number_kind`.
    pub fn new(aggregation: &Aggregation, number_kind: NumberKind) -> Self {
        Self::from_value(AggregatorValue::new(aggregation, number_kind))
    }

    pub fn sum(number_kind: NumberKind) -> Self {
        Self::new(&Aggregation::Sum, number_kind)
    }

    pub fn min_max_sum_count(number_kind: NumberKind) -> Self {
        Self::new(&Aggregation::MinMaxSumCount, number_kind)
    }

    /// Histogram aggregator. `boundaries` must be sorted ascending.
    pub fn histogram(boundaries: impl Into<Vec<f64>>, number_kind: NumberKind) -> Self {
        Self::new(&Aggregation::histogram(boundaries), number_kind)
    }

    pub fn sketch(relative_accuracy: f64, number_kind: NumberKind) -> Self {
        Self::new(&Aggregation::Sketch { relative_accuracy }, number_kind)
    }

    /// An empty aggregator shaped like `template` (same kind and configuration).
    pub fn like(template: &AggregatorValue) -> Self {
        Self::from_value(template.identity())
    }

    fn from_value(empty: AggregatorValue) -> Self {
        let number_kind = match &empty {
            AggregatorValue::Sum(sum) => sum.kind(),
            AggregatorValue::MinMaxSumCount(mmsc) => mmsc.sum.kind(),
            AggregatorValue::Histogram(hist) => hist.sum().kind(),
            AggregatorValue::Sketch(sketch) => sketch.sum().kind(),
        };
        Self {
            kind: empty.kind(),
            number_kind,
            state: Mutex::new(AggregatorState {
                checkpoint: empty.clone(),
                live: empty,
                dirty: false,
            }),
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }

    /// Apply one measurement to the live value. Non-finite values are dropped.
    pub fn update(&self, value: impl Into<Number>) {
        let value = value.into();
        if !value.is_finite() {
            tracing::debug!(kind = %self.kind, %value, "dropping non-finite measurement");
            return;
        }
        let value = value.convert(self.number_kind);
        let mut state = self.state.lock();
        state.live.update(value);
        state.dirty = true;
    }

    /// Move the live value into the checkpoint and reset the live value.
    pub fn checkpoint(&self) {
        let mut state = self.state.lock();
        let empty = state.live.identity();
        state.checkpoint = std::mem::replace(&mut state.live, empty);
        state.dirty = false;
    }

    /// Fold `other`'s live value into this aggregator's live value.
    ///
    /// Fails with [`Error::KindMismatch`] when the kinds differ.
    pub fn merge(&self, other: &Aggregator) -> Result<()> {
        if self.kind != other.kind {
            return Err(Error::KindMismatch {
                expected: self.kind,
                found: other.kind,
            });
        }
        // Copy first so the two locks are never held together.
        let incoming = other.values();
        self.merge_value(&incoming)
    }

    /// Fold an owned value into the live value.
    pub fn merge_value(&self, value: &AggregatorValue) -> Result<()> {
        let mut state = self.state.lock();
        state.live.merge(value)?;
        state.dirty = true;
        Ok(())
    }

    /// Copy of the live value.
    pub fn values(&self) -> AggregatorValue {
        self.state.lock().live.clone()
    }

    /// Copy of the last checkpoint.
    pub fn checkpoint_value(&self) -> AggregatorValue {
        self.state.lock().checkpoint.clone()
    }

    /// Take the live value, leaving the identity behind. The checkpoint is untouched.
    pub fn drain(&self) -> AggregatorValue {
        let mut state = self.state.lock();
        let empty = state.live.identity();
        state.dirty = false;
        std::mem::replace(&mut state.live, empty)
    }

    /// Whether the live value changed since it was last drained or checkpointed.
    pub fn has_updates(&self) -> bool {
        self.state.lock().dirty
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("kind", &self.kind)
            .field("number_kind", &self.number_kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn sum_of(value: AggregatorValue) -> Number {
        match value {
            AggregatorValue::Sum(sum) => sum,
            other => panic!("expected sum, got {other:?}"),
        }
    }

    fn mmsc_of(value: AggregatorValue) -> MinMaxSumCount {
        match value {
            AggregatorValue::MinMaxSumCount(mmsc) => mmsc,
            other => panic!("expected min_max_sum_count, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_checkpoint() {
        let agg = Aggregator::sum(NumberKind::I64);
        assert_eq!(agg.kind(), AggregatorKind::Sum);

        for value in 1..=10 {
            agg.update(Number::I64(value));
        }
        assert_eq!(sum_of(agg.values()), Number::I64(55));

        agg.checkpoint();
        assert_eq!(sum_of(agg.checkpoint_value()), Number::I64(55));
        assert_eq!(sum_of(agg.values()), Number::I64(0));
    }

    #[test]
    fn test_min_max_sum_count_checkpoint() {
        let agg = Aggregator::min_max_sum_count(NumberKind::I64);
        for value in [7, 3, 12, -4, 5] {
            agg.update(Number::I64(value));
        }
        agg.checkpoint();

        let checkpoint = mmsc_of(agg.checkpoint_value());
        assert_eq!(checkpoint.min, Number::I64(-4));
        assert_eq!(checkpoint.max, Number::I64(12));
        assert_eq!(checkpoint.sum, Number::I64(23));
        assert_eq!(checkpoint.count, 5);

        let live = mmsc_of(agg.values());
        assert_eq!(live, MinMaxSumCount::new(NumberKind::I64));

        // Only updates since the previous checkpoint count.
        agg.update(Number::I64(100));
        agg.checkpoint();
        let checkpoint = mmsc_of(agg.checkpoint_value());
        assert_eq!(checkpoint.min, Number::I64(100));
        assert_eq!(checkpoint.max, Number::I64(100));
        assert_eq!(checkpoint.count, 1);
    }

    #[test]
    fn test_histogram_end_to_end() {
        let agg = Aggregator::histogram(vec![10.0, 20.0, 30.0, 40.0, 50.0], NumberKind::I64);
        for value in 0..60 {
            agg.update(Number::I64(value));
        }
        agg.checkpoint();

        match agg.checkpoint_value() {
            AggregatorValue::Histogram(hist) => {
                assert_eq!(hist.counts(), &[10, 10, 10, 10, 10, 10]);
                assert_eq!(hist.sum(), Number::I64(1770));
                assert_eq!(hist.count(), 60);
            }
            other => panic!("expected histogram, got {other:?}"),
        }

        match agg.values() {
            AggregatorValue::Histogram(hist) => {
                assert_eq!(hist.count(), 0);
                assert_eq!(hist.counts().len(), 6);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_kind_mismatch() {
        let sum = Aggregator::sum(NumberKind::I64);
        let mmsc = Aggregator::min_max_sum_count(NumberKind::I64);
        let err = sum.merge(&mmsc).unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch {
                expected: AggregatorKind::Sum,
                found: AggregatorKind::MinMaxSumCount
            }
        ));
    }

    #[test]
    fn test_merge_uses_live_values() {
        let a = Aggregator::sum(NumberKind::I64);
        let b = Aggregator::sum(NumberKind::I64);
        a.update(Number::I64(1));
        b.update(Number::I64(10));
        b.checkpoint();
        b.update(Number::I64(2));

        a.merge(&b).unwrap();
        assert_eq!(sum_of(a.values()), Number::I64(3));
        // Source is unchanged.
        assert_eq!(sum_of(b.values()), Number::I64(2));
    }

    #[test]
    fn test_merge_into_self() {
        let a = Aggregator::sum(NumberKind::I64);
        a.update(Number::I64(4));
        a.merge(&a).unwrap();
        assert_eq!(sum_of(a.values()), Number::I64(8));
    }

    #[test]
    fn test_merge_is_associative_and_commutative() {
        let build = |kind: &Aggregation, values: &[i64]| {
            let agg = Aggregator::new(kind, NumberKind::I64);
            for v in values {
                agg.update(Number::I64(*v));
            }
            agg
        };

        for aggregation in [Aggregation::Sum, Aggregation::MinMaxSumCount] {
            let inputs: [&[i64]; 3] = [&[1, 9, -3], &[4], &[-7, 20]];

            // merge(merge(a, b), c)
            let left = build(&aggregation, inputs[0]);
            left.merge(&build(&aggregation, inputs[1])).unwrap();
            left.merge(&build(&aggregation, inputs[2])).unwrap();

            // merge(a, merge(b, c))
            let bc = build(&aggregation, inputs[1]);
            bc.merge(&build(&aggregation, inputs[2])).unwrap();
            let right = build(&aggregation, inputs[0]);
            right.merge(&bc).unwrap();

            // merge(c, merge(b, a))
            let ba = build(&aggregation, inputs[1]);
            ba.merge(&build(&aggregation, inputs[0])).unwrap();
            let swapped = build(&aggregation, inputs[2]);
            swapped.merge(&ba).unwrap();

            left.checkpoint();
            right.checkpoint();
            swapped.checkpoint();
            assert_eq!(left.checkpoint_value(), right.checkpoint_value());
            assert_eq!(left.checkpoint_value(), swapped.checkpoint_value());
        }
    }

    #[test]
    fn test_drain_leaves_checkpoint() {
        let agg = Aggregator::sum(NumberKind::F64);
        agg.update(Number::F64(1.5));
        assert!(agg.has_updates());

        let drained = agg.drain();
        assert_eq!(drained, AggregatorValue::Sum(Number::F64(1.5)));
        assert!(!agg.has_updates());
        assert_eq!(agg.values(), AggregatorValue::Sum(Number::F64(0.0)));
        assert_eq!(agg.checkpoint_value(), AggregatorValue::Sum(Number::F64(0.0)));
    }

    #[test]
    fn test_update_converts_to_number_kind() {
        let agg = Aggregator::sum(NumberKind::I64);
        agg.update(2.7_f64);
        assert_eq!(agg.values(), AggregatorValue::Sum(Number::I64(2)));
    }

    #[test]
    fn test_non_finite_update_is_dropped() {
        let sketch = Aggregator::sketch(0.01, NumberKind::F64);
        sketch.update(f64::NAN);
        assert!(!sketch.has_updates());
        match sketch.values() {
            AggregatorValue::Sketch(s) => {
                assert_eq!(s.count(), 0);
                assert_eq!(s.quantile(0.5), None);
            }
            other => panic!("expected sketch, got {other:?}"),
        }

        let mmsc = Aggregator::min_max_sum_count(NumberKind::F64);
        mmsc.update(f64::INFINITY);
        mmsc.update(2.0);
        match mmsc.values() {
            AggregatorValue::MinMaxSumCount(m) => {
                assert_eq!(m.count, 1);
                assert_eq!(m.max, Number::F64(2.0));
            }
            other => panic!("expected min/max/sum/count, got {other:?}"),
        }
    }

    #[test]
    fn test_like_copies_configuration() {
        let hist = Aggregator::histogram(vec![1.0, 2.0], NumberKind::F64);
        hist.update(1.5);
        let copy = Aggregator::like(&hist.values());
        assert_eq!(copy.kind(), AggregatorKind::Histogram);
        assert_eq!(copy.number_kind(), NumberKind::F64);
        match copy.values() {
            AggregatorValue::Histogram(h) => {
                assert_eq!(h.boundaries(), &[1.0, 2.0]);
                assert_eq!(h.count(), 0);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregation_validate() {
        assert!(Aggregation::histogram(vec![1.0, f64::NAN]).validate().is_err());
        assert!(Aggregation::Sketch { relative_accuracy: 1.0 }.validate().is_err());
        assert!(Aggregation::sketch().validate().is_ok());
        assert!(Aggregation::Sum.validate().is_ok());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let agg = Arc::new(Aggregator::sum(NumberKind::I64));
        let mut handles = vec![];

        for _ in 0..8 {
            let agg = Arc::clone(&agg);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    agg.update(Number::I64(1));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        agg.checkpoint();
        assert_eq!(agg.checkpoint_value(), AggregatorValue::Sum(Number::I64(8000)));
    }

    #[test]
    fn test_concurrent_checkpoint_loses_nothing() {
        let agg = Arc::new(Aggregator::sum(NumberKind::I64));
        let writer = {
            let agg = Arc::clone(&agg);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    agg.update(Number::I64(1));
                }
            })
        };

        let mut total = 0;
        while !writer.is_finished() {
            agg.checkpoint();
            total += match agg.checkpoint_value() {
                AggregatorValue::Sum(Number::I64(v)) => v,
                other => panic!("unexpected {other:?}"),
            };
        }
        writer.join().unwrap();
        agg.checkpoint();
        total += match agg.checkpoint_value() {
            AggregatorValue::Sum(Number::I64(v)) => v,
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(total, 10_000);
    }
}
