//! Numeric measurement values.
//!
//! Instruments are created for exactly one [`NumberKind`]; every aggregator
//! they own keeps that kind for its whole lifetime. Arithmetic between two
//! values of different kinds falls back to `f64`.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// The representation used by an instrument's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    /// Signed 64-bit integers.
    I64,
    /// 64-bit floating point.
    F64,
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberKind::I64 => write!(f, "i64"),
            NumberKind::F64 => write!(f, "f64"),
        }
    }
}

/// A single measurement or aggregated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    /// Integer value.
    I64(i64),
    /// Floating point value.
    F64(f64),
}

impl Number {
    /// Additive identity for `kind`.
    pub fn zero(kind: NumberKind) -> Self {
        match kind {
            NumberKind::I64 => Number::I64(0),
            NumberKind::F64 => Number::F64(0.0),
        }
    }

    /// Identity element for a running minimum.
    pub fn max_value(kind: NumberKind) -> Self {
        match kind {
            NumberKind::I64 => Number::I64(i64::MAX),
            NumberKind::F64 => Number::F64(f64::INFINITY),
        }
    }

    /// Identity element for a running maximum.
    pub fn min_value(kind: NumberKind) -> Self {
        match kind {
            NumberKind::I64 => Number::I64(i64::MIN),
            NumberKind::F64 => Number::F64(f64::NEG_INFINITY),
        }
    }

    /// The kind of this value.
    pub fn kind(&self) -> NumberKind {
        match self {
            Number::I64(_) => NumberKind::I64,
            Number::F64(_) => NumberKind::F64,
        }
    }

    /// Lossy conversion to `f64`.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(v) => v as f64,
            Number::F64(v) => v,
        }
    }

    /// Whether the value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        match *self {
            Number::I64(v) => v < 0,
            Number::F64(v) => v < 0.0,
        }
    }

    /// Whether the value can be aggregated (integers always, floats when finite).
    pub fn is_finite(&self) -> bool {
        match *self {
            Number::I64(_) => true,
            Number::F64(v) => v.is_finite(),
        }
    }

    /// Convert to `kind`. Floats are truncated toward zero when narrowed.
    pub fn convert(self, kind: NumberKind) -> Number {
        match (self, kind) {
            (Number::F64(v), NumberKind::I64) => Number::I64(v as i64),
            (Number::I64(v), NumberKind::F64) => Number::F64(v as f64),
            (same, _) => same,
        }
    }

    /// Sum of two values. Integer addition saturates.
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Number::I64(a.saturating_add(b)),
            (Number::F64(a), Number::F64(b)) => Number::F64(a + b),
            (a, b) => Number::F64(a.to_f64() + b.to_f64()),
        }
    }

    /// The smaller of two values.
    pub fn min(self, other: Number) -> Number {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    /// The larger of two values.
    pub fn max(self, other: Number) -> Number {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => a.partial_cmp(b),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(b),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(v) => write!(f, "{v}"),
            Number::F64(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::I64(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::F64(value)
    }
}

/// Rust types an instrument can be created for.
pub trait MeasurementValue: Copy + Into<Number> + Send + Sync + 'static {
    /// Number kind recorded by instruments of this type.
    const KIND: NumberKind;
}

impl MeasurementValue for i64 {
    const KIND: NumberKind = NumberKind::I64;
}

impl MeasurementValue for f64 {
    const KIND: NumberKind = NumberKind::F64;
}
