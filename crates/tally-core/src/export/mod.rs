//! Exporters receive each finished checkpoint.

mod logging;
mod memory;

use std::time::Duration;

pub use logging::LoggingExporter;
pub use memory::InMemoryExporter;

use crate::error::Result;
use crate::record::Record;

/// Destination for checkpointed records.
///
/// `timeout` bounds how long the exporter may block; enforcing it is the
/// exporter's responsibility.
pub trait Exporter: Send {
    fn export(&mut self, records: &[Record], timeout: Duration) -> Result<()>;
}

impl<E: Exporter + ?Sized> Exporter for Box<E> {
    fn export(&mut self, records: &[Record], timeout: Duration) -> Result<()> {
        (**self).export(records, timeout)
    }
}
