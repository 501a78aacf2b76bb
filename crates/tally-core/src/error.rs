//! Core error types.

use thiserror::Error;

use crate::aggregator::AggregatorKind;

/// Errors raised by instruments, aggregators and the collection pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A value or argument violated an instrument contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An instrument with this name is already registered on the meter.
    #[error("instrument already registered: {0}")]
    DuplicateInstrument(String),

    /// Two aggregators of different kinds were combined.
    #[error("aggregator kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind of the receiving aggregator.
        expected: AggregatorKind,
        /// Kind of the aggregator being merged in.
        found: AggregatorKind,
    },

    /// Same-kind aggregators whose configuration differs (boundaries, accuracy).
    #[error("incompatible aggregators: {0}")]
    IncompatibleAggregators(String),

    /// A measurement referenced an instrument owned by a different meter.
    #[error("instrument {instrument} is not registered with meter {meter}")]
    UnknownInstrument {
        /// Meter the batch was recorded against.
        meter: String,
        /// Instrument name carried by the measurement.
        instrument: String,
    },

    /// Exporter failure.
    #[error("export error: {0}")]
    Export(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The process-wide meter provider was installed twice.
    #[error("meter provider already initialized")]
    ProviderAlreadyInitialized,
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
