//! Shared benchmark fixtures.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tally_core::{Aggregation, LabelSet, Meter};

/// Number of distinct label sets per instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Small,
    Medium,
    Large,
}

impl Scale {
    pub fn series(&self) -> usize {
        match self {
            Scale::Small => 10,
            Scale::Medium => 100,
            Scale::Large => 1_000,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scale::Small => "small",
            Scale::Medium => "medium",
            Scale::Large => "large",
        }
    }
}

/// `count` distinct label sets with two keys each.
pub fn label_sets(count: usize) -> Vec<LabelSet> {
    (0..count)
        .map(|i| LabelSet::from([("route", format!("/r{}", i % 97)), ("shard", i.to_string())]))
        .collect()
}

/// Latency-like boundaries used by the histogram benchmarks.
pub const LATENCY_BOUNDARIES: [f64; 8] = [1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0];

/// A meter with one counter and one histogram recorder, each holding one
/// series per label set at `scale`.
pub fn populated_meter(scale: Scale) -> Arc<Meter> {
    let meter = Arc::new(Meter::new("bench"));
    let mut rng = StdRng::seed_from_u64(42);
    let labels = label_sets(scale.series());

    if let Ok(counter) = meter.new_counter::<i64>("requests", "", "1", true) {
        for set in &labels {
            let _ = counter.add(rng.gen_range(1..100), set);
        }
    }
    if let Ok(recorder) = meter.new_value_recorder_with_aggregation::<f64>(
        "latency",
        "",
        "ms",
        true,
        Aggregation::histogram(LATENCY_BOUNDARIES.to_vec()),
    ) {
        for set in &labels {
            let _ = recorder.record(rng.gen_range(0.1..300.0), set);
        }
    }
    meter
}
