//! Tally Core - Aggregators, instruments, meter, processor and push controller.
//!
//! Application code records measurements on instruments created from a
//! [`Meter`]. A [`PushController`] periodically collects the meter, folds the
//! records through a [`Processor`] and hands the checkpoint to an [`Exporter`].
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tally_core::{
//!     ControllerConfig, InMemoryExporter, LabelSet, Meter, PushController, UngroupedProcessor,
//! };
//!
//! let meter = Arc::new(Meter::new("app"));
//! let requests = meter.new_counter::<i64>("requests", "served requests", "1", true)?;
//!
//! let exporter = InMemoryExporter::new();
//! let controller = PushController::new(
//!     Arc::clone(&meter),
//!     UngroupedProcessor::stateless(),
//!     exporter.clone(),
//!     ControllerConfig::new(Duration::from_secs(60)),
//! )?;
//!
//! controller.start();
//! requests.add(5, &LabelSet::from([("route", "/")]))?;
//! controller.stop();
//!
//! assert_eq!(exporter.export_count(), 1);
//! # Ok::<(), tally_core::Error>(())
//! ```

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod global;
pub mod instrument;
pub mod labels;
pub mod meter;
pub mod number;
pub mod processor;
pub mod provider;
pub mod record;

pub use aggregator::{
    Aggregation, Aggregator, AggregatorKind, AggregatorValue, Histogram, MinMaxSumCount, Sketch,
};
pub use config::{ControllerConfig, DEFAULT_PERIOD_SECS, DEFAULT_TIMEOUT_SECS};
pub use controller::PushController;
pub use error::{Error, Result};
pub use export::{Exporter, InMemoryExporter, LoggingExporter};
pub use instrument::{
    BoundCounter, BoundInstrument, BoundUpDownCounter, BoundValueRecorder, Counter,
    InstrumentDescriptor, InstrumentKind, Measurement, Observer, ObserverResult, UpDownCounter,
    ValueRecorder,
};
pub use labels::LabelSet;
pub use meter::Meter;
pub use number::{MeasurementValue, Number, NumberKind};
pub use processor::{Processor, ProcessorMode, UngroupedProcessor};
pub use provider::MeterProvider;
pub use record::Record;
