//! Workload progress, published as a sum observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tally_core::{LabelSet, Meter, Observer};

/// Counts applied operations.
///
/// Collection drains whatever an observer reports, so the callback hands over
/// only the operations applied since the previous collection. A stateful
/// processor then accumulates the running total and a stateless one shows
/// the per-cycle count.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pending: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `operations_applied` sum observer on `meter`.
    pub fn register(&self, meter: &Meter) -> tally_core::Result<Observer<i64>> {
        let pending = Arc::clone(&self.pending);
        meter.new_sum_observer::<i64>(
            "operations_applied",
            "Workload operations applied",
            "1",
            true,
            move |result| {
                let delta = i64::try_from(pending.swap(0, Ordering::Relaxed)).unwrap_or(i64::MAX);
                if let Err(e) = result.observe(delta, &LabelSet::empty()) {
                    tracing::warn!(error = %e, "dropped observation");
                }
            },
        )
    }

    pub fn record_applied(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Operations applied since the workload started.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
