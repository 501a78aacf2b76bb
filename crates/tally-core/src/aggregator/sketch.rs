//! Relative-error quantile sketch.
//!
//! Values are mapped to logarithmically sized buckets: a positive value `v`
//! goes to bucket `ceil(ln(v) / ln(gamma))` with `gamma = (1 + a) / (1 - a)`,
//! which bounds the relative error of any reported quantile by `a`. Negative
//! values use a mirrored store keyed by magnitude; values too close to zero to
//! index share a single zero bucket.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::number::{Number, NumberKind};

/// Default relative accuracy for sketches.
pub const DEFAULT_RELATIVE_ACCURACY: f64 = 0.01;

/// Magnitudes below this are counted in the zero bucket.
const MIN_INDEXABLE: f64 = 1e-9;

/// Log-bucketed distribution summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sketch {
    relative_accuracy: f64,
    #[serde(skip)]
    gamma: f64,
    #[serde(skip)]
    gamma_ln: f64,
    positive: BTreeMap<i32, u64>,
    negative: BTreeMap<i32, u64>,
    zero_count: u64,
    sum: Number,
    count: u64,
    min: Number,
    max: Number,
}

impl Sketch {
    /// Create an empty sketch. `relative_accuracy` must lie in `(0, 1)`.
    pub fn new(relative_accuracy: f64, kind: NumberKind) -> Self {
        let gamma = (1.0 + relative_accuracy) / (1.0 - relative_accuracy);
        Self {
            relative_accuracy,
            gamma,
            gamma_ln: gamma.ln(),
            positive: BTreeMap::new(),
            negative: BTreeMap::new(),
            zero_count: 0,
            sum: Number::zero(kind),
            count: 0,
            min: Number::max_value(kind),
            max: Number::min_value(kind),
        }
    }

    fn key(&self, magnitude: f64) -> i32 {
        (magnitude.ln() / self.gamma_ln).ceil() as i32
    }

    fn bucket_value(&self, key: i32) -> f64 {
        2.0 * self.gamma.powi(key) / (self.gamma + 1.0)
    }

    /// Add one value. Non-finite values are ignored.
    pub fn update(&mut self, value: Number) {
        let v = value.to_f64();
        if !v.is_finite() {
            return;
        }
        if v > MIN_INDEXABLE {
            *self.positive.entry(self.key(v)).or_insert(0) += 1;
        } else if v < -MIN_INDEXABLE {
            *self.negative.entry(self.key(-v)).or_insert(0) += 1;
        } else {
            self.zero_count += 1;
        }
        self.sum = self.sum.add(value);
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &Sketch) -> Result<()> {
        if (self.relative_accuracy - other.relative_accuracy).abs() > f64::EPSILON {
            return Err(Error::IncompatibleAggregators(format!(
                "sketch accuracy differs: {} vs {}",
                self.relative_accuracy, other.relative_accuracy
            )));
        }
        for (key, count) in &other.positive {
            *self.positive.entry(*key).or_insert(0) += count;
        }
        for (key, count) in &other.negative {
            *self.negative.entry(*key).or_insert(0) += count;
        }
        self.zero_count += other.zero_count;
        self.sum = self.sum.add(other.sum);
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.relative_accuracy, self.sum.kind());
    }

    /// Estimate the `q`-quantile, `q` in `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.count == 0 || !(0.0..=1.0).contains(&q) {
            return None;
        }

        let rank = (q * (self.count - 1) as f64) as u64;
        let (lo, hi) = (self.min.to_f64(), self.max.to_f64());
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return None;
        }
        let mut seen = 0u64;

        for (key, count) in self.negative.iter().rev() {
            seen += count;
            if seen > rank {
                return Some((-self.bucket_value(*key)).clamp(lo, hi));
            }
        }

        seen += self.zero_count;
        if seen > rank {
            return Some(0.0_f64.clamp(lo, hi));
        }

        for (key, count) in &self.positive {
            seen += count;
            if seen > rank {
                return Some(self.bucket_value(*key).clamp(lo, hi));
            }
        }

        Some(hi)
    }

    pub fn relative_accuracy(&self) -> f64 {
        self.relative_accuracy
    }

    pub fn sum(&self) -> Number {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Number {
        self.min
    }

    pub fn max(&self) -> Number {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, accuracy: f64) {
        let err = (actual - expected).abs() / expected.abs().max(f64::MIN_POSITIVE);
        assert!(err <= accuracy + 1e-9, "{actual} not within {accuracy} of {expected}");
    }

    #[test]
    fn test_quantiles_within_accuracy() {
        let mut sketch = Sketch::new(DEFAULT_RELATIVE_ACCURACY, NumberKind::I64);
        for value in 1..=100 {
            sketch.update(Number::I64(value));
        }

        assert_eq!(sketch.count(), 100);
        assert_eq!(sketch.sum(), Number::I64(5050));
        assert_eq!(sketch.quantile(0.0), Some(1.0));
        assert_close(sketch.quantile(0.5).unwrap(), 50.0, DEFAULT_RELATIVE_ACCURACY);
        assert_close(sketch.quantile(1.0).unwrap(), 100.0, DEFAULT_RELATIVE_ACCURACY);
    }

    #[test]
    fn test_negative_and_zero_values() {
        let mut sketch = Sketch::new(0.02, NumberKind::F64);
        for value in [-8.0, -2.0, 0.0, 2.0, 8.0] {
            sketch.update(Number::F64(value));
        }

        assert_close(sketch.quantile(0.0).unwrap(), -8.0, 0.02);
        assert_eq!(sketch.quantile(0.5), Some(0.0));
        assert_close(sketch.quantile(0.75).unwrap(), 2.0, 0.02);
        assert_eq!(sketch.min(), Number::F64(-8.0));
        assert_eq!(sketch.max(), Number::F64(8.0));
    }

    #[test]
    fn test_merge() {
        let mut a = Sketch::new(0.01, NumberKind::I64);
        let mut b = Sketch::new(0.01, NumberKind::I64);
        a.update(Number::I64(10));
        b.update(Number::I64(1000));

        a.merge(&b).unwrap();
        assert_eq!(a.count(), 2);
        assert_eq!(a.max(), Number::I64(1000));

        let c = Sketch::new(0.05, NumberKind::I64);
        assert!(matches!(a.merge(&c), Err(Error::IncompatibleAggregators(_))));
    }

    #[test]
    fn test_empty_and_out_of_range() {
        let mut sketch = Sketch::new(0.01, NumberKind::I64);
        assert_eq!(sketch.quantile(0.5), None);
        sketch.update(Number::I64(3));
        assert_eq!(sketch.quantile(1.5), None);
        sketch.reset();
        assert_eq!(sketch.count(), 0);
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let mut sketch = Sketch::new(0.01, NumberKind::F64);
        sketch.update(Number::F64(f64::NAN));
        sketch.update(Number::F64(f64::INFINITY));
        assert_eq!(sketch.count(), 0);
        assert_eq!(sketch.quantile(0.5), None);

        sketch.update(Number::F64(4.0));
        sketch.update(Number::F64(f64::NEG_INFINITY));
        assert_eq!(sketch.count(), 1);
        assert_close(sketch.quantile(0.5).unwrap(), 4.0, 0.01);
    }
}
