//! Min, max, sum and count of a value stream.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::number::{Number, NumberKind};

/// Summary of the values seen since the last reset.
///
/// The empty state is `{max_value, min_value, 0, 0}` so that the first
/// update replaces both bounds. Serialized empty summaries carry `null`
/// bounds rather than the sentinels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxSumCount {
    /// Smallest value seen.
    pub min: Number,
    /// Largest value seen.
    pub max: Number,
    /// Sum of all values.
    pub sum: Number,
    /// Number of values.
    pub count: u64,
}

impl MinMaxSumCount {
    /// The empty summary for `kind`.
    pub fn new(kind: NumberKind) -> Self {
        Self {
            min: Number::max_value(kind),
            max: Number::min_value(kind),
            sum: Number::zero(kind),
            count: 0,
        }
    }

    pub fn update(&mut self, value: Number) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum = self.sum.add(value);
        self.count += 1;
    }

    pub fn merge(&mut self, other: &MinMaxSumCount) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum = self.sum.add(other.sum);
        self.count += other.count;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.sum.kind());
    }

    /// Whether no value has been recorded.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Serialize for MinMaxSumCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bounds = (!self.is_empty()).then_some((self.min, self.max));
        let mut state = serializer.serialize_struct("MinMaxSumCount", 4)?;
        state.serialize_field("min", &bounds.map(|(min, _)| min))?;
        state.serialize_field("max", &bounds.map(|(_, max)| max))?;
        state.serialize_field("sum", &self.sum)?;
        state.serialize_field("count", &self.count)?;
        state.end()
    }
}
