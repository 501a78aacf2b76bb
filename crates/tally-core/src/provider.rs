//! Meter provider: hands out meters by name.

use std::sync::Arc;

use dashmap::DashMap;

use crate::meter::Meter;

/// Registry of meters keyed by name. Asking twice for the same name returns
/// the same meter.
#[derive(Debug, Default)]
pub struct MeterProvider {
    meters: DashMap<String, Arc<Meter>>,
}

impl MeterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the meter called `name`, creating it on first use.
    pub fn meter(&self, name: &str) -> Arc<Meter> {
        if let Some(existing) = self.meters.get(name) {
            return Arc::clone(existing.value());
        }
        let entry = self.meters.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(meter = %name, "creating meter");
            Arc::new(Meter::new(name))
        });
        Arc::clone(entry.value())
    }

    /// Names of every meter created so far, sorted.
    pub fn meter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.meters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
