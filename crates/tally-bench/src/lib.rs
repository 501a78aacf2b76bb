//! Tally Benchmark Suite
//!
//! Criterion benchmarks for the metrics pipeline.
//!
//! # Benchmark Categories
//!
//! - **Instruments**: unbound add, bound add, histogram record, contended add
//! - **Pipeline**: collect and full collect → process → export ticks

pub mod fixtures;

pub use fixtures::{label_sets, populated_meter, Scale};
