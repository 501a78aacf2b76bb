//! Fixed-bucket histogram state.
//!
//! Boundaries are fixed at construction and must be sorted ascending. A value
//! lands in the bucket of the first boundary strictly greater than it; values
//! at or above the last boundary go to the trailing overflow bucket, so there
//! is always one more count than there are boundaries.
//!
//! Sortedness is not checked. Unsorted boundaries give meaningless buckets.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::number::{Number, NumberKind};

/// Bucket counts plus sum and count of observed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// Upper (exclusive) bucket boundaries.
    boundaries: Arc<[f64]>,
    /// Per-bucket counts, `boundaries.len() + 1` entries.
    counts: Vec<u64>,
    /// Sum of all observed values.
    sum: Number,
    /// Total count of observations.
    count: u64,
}

impl Histogram {
    /// Create an empty histogram over `boundaries`.
    pub fn new(boundaries: impl Into<Arc<[f64]>>, kind: NumberKind) -> Self {
        let boundaries = boundaries.into();
        let counts = vec![0; boundaries.len() + 1];
        Self {
            boundaries,
            counts,
            sum: Number::zero(kind),
            count: 0,
        }
    }

    /// Index of the bucket `value` falls into.
    pub fn bucket_index(&self, value: f64) -> usize {
        self.boundaries.partition_point(|&boundary| boundary <= value)
    }

    /// Record a value.
    pub fn update(&mut self, value: Number) {
        let bucket = self.bucket_index(value.to_f64());
        self.counts[bucket] += 1;
        self.sum = self.sum.add(value);
        self.count += 1;
    }

    /// Add another histogram's counts into this one.
    pub fn merge(&mut self, other: &Histogram) -> Result<()> {
        if self.boundaries != other.boundaries {
            return Err(Error::IncompatibleAggregators(format!(
                "histogram boundaries differ: {:?} vs {:?}",
                self.boundaries, other.boundaries
            )));
        }
        for (count, other_count) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += other_count;
        }
        self.sum = self.sum.add(other.sum);
        self.count += other.count;
        Ok(())
    }

    /// Zero the counts, sum and count. Boundaries are kept.
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 0);
        self.sum = Number::zero(self.sum.kind());
        self.count = 0;
    }

    /// Bucket boundaries.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Per-bucket counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of all observed values.
    pub fn sum(&self) -> Number {
        self.sum
    }

    /// Total count of observations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get approximate percentile (e.g., 0.50 for P50, 0.99 for P99).
    ///
    /// Returns the upper boundary of the bucket containing the target rank.
    /// Ranks in the overflow bucket report the last boundary.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.count == 0 || self.boundaries.is_empty() {
            return None;
        }

        let target = ((self.count as f64 * p).ceil() as u64).max(1);
        let mut cumulative = 0u64;

        for (i, count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return self
                    .boundaries
                    .get(i)
                    .or_else(|| self.boundaries.last())
                    .copied();
            }
        }

        self.boundaries.last().copied()
    }
}
