use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::Exporter;
use crate::error::{Error, Result};
use crate::record::Record;

/// Keeps every exported batch in memory. Clones share the same buffer, so one
/// clone can be handed to a controller while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExporter {
    batches: Arc<Mutex<Vec<Vec<Record>>>>,
    fail: Arc<Mutex<bool>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All batches exported so far, oldest first.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().clone()
    }

    /// Number of export calls that succeeded.
    pub fn export_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Most recent batch, if any.
    pub fn last_batch(&self) -> Option<Vec<Record>> {
        self.batches.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }

    /// Make subsequent exports fail with [`Error::Export`].
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

impl Exporter for InMemoryExporter {
    fn export(&mut self, records: &[Record], _timeout: Duration) -> Result<()> {
        if *self.fail.lock() {
            return Err(Error::Export("in-memory exporter set to fail".to_string()));
        }
        self.batches.lock().push(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::aggregator::AggregatorValue;
    use crate::instrument::{InstrumentDescriptor, InstrumentKind};
    use crate::number::{Number, NumberKind};

    fn record() -> Record {
        Record::new(
            Arc::new(InstrumentDescriptor::new(
                "hits",
                "",
                "1",
                InstrumentKind::Counter,
                NumberKind::I64,
                true,
            )),
            "",
            AggregatorValue::Sum(Number::I64(1)),
            SystemTime::now(),
        )
    }

    #[test]
    fn test_clones_share_batches() {
        let exporter = InMemoryExporter::new();
        let mut handle = exporter.clone();

        handle.export(&[record()], Duration::from_secs(1)).unwrap();
        handle.export(&[], Duration::from_secs(1)).unwrap();

        assert_eq!(exporter.export_count(), 2);
        assert_eq!(exporter.batches()[0].len(), 1);
        assert_eq!(exporter.last_batch(), Some(vec![]));

        exporter.clear();
        assert_eq!(handle.export_count(), 0);
    }

    #[test]
    fn test_failing() {
        let mut exporter = InMemoryExporter::new();
        exporter.set_failing(true);
        let err = exporter.export(&[record()], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Export(_)));
        assert_eq!(exporter.export_count(), 0);

        exporter.set_failing(false);
        exporter.export(&[record()], Duration::from_secs(1)).unwrap();
        assert_eq!(exporter.export_count(), 1);
    }
}
