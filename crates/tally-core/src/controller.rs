//! Push controller: background loop driving collect → process → export.
//!
//! ```text
//!  start()                 every `period`                      stop()
//!    │   ┌──────────────────────────────────────────────┐        │
//!    └──►│ wait ──► tick: Meter::collect                 │◄─ wake ┘
//!        │              ──► Processor::process (each)    │
//!        │              ──► Processor::checkpoint_self   │
//!        │              ──► Processor::finished_collection
//!        │              ──► Exporter::export             │
//!        └──────────────────────────────────────────────┘
//!                      join, then one final tick
//! ```
//!
//! Export failures are logged and absorbed; the loop keeps its schedule.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::export::Exporter;
use crate::meter::Meter;
use crate::processor::Processor;

struct Pipeline {
    processor: Box<dyn Processor>,
    exporter: Box<dyn Exporter>,
}

struct Shared {
    meter: Arc<Meter>,
    pipeline: Mutex<Pipeline>,
    config: ControllerConfig,
    stop: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn run(&self) {
        let mut stop = self.stop.lock();
        loop {
            let deadline = Instant::now() + self.config.period;
            while !*stop {
                if self.wake.wait_until(&mut stop, deadline).timed_out() {
                    break;
                }
            }
            if *stop {
                break;
            }
            MutexGuard::unlocked(&mut stop, || {
                self.tick();
            });
        }
    }

    fn tick(&self) -> usize {
        let started = Instant::now();
        let mut pipeline = self.pipeline.lock();
        let Pipeline {
            processor,
            exporter,
        } = &mut *pipeline;

        let records = self.meter.collect();
        let collected = records.len();
        for record in records {
            let descriptor = Arc::clone(record.descriptor());
            let labels = record.labels().to_owned();
            if let Err(e) = processor.process(record) {
                tracing::warn!(
                    instrument = %descriptor.name(),
                    labels = %labels,
                    error = %e,
                    "processor rejected record"
                );
            }
        }

        let checkpoint = processor.checkpoint_self();
        processor.finished_collection();

        match exporter.export(&checkpoint, self.config.timeout) {
            Ok(()) => tracing::debug!(
                meter = %self.meter.name(),
                collected,
                exported = checkpoint.len(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "tick complete"
            ),
            Err(e) => tracing::error!(
                meter = %self.meter.name(),
                records = checkpoint.len(),
                error = %e,
                "export failed"
            ),
        }

        checkpoint.len()
    }
}

/// Periodically collects a meter and pushes the processed checkpoint to an exporter.
///
/// `start`/`stop` are serialized; at most one background loop runs at a time
/// and the loop never overlaps a manual [`tick`](Self::tick).
pub struct PushController {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PushController {
    pub fn new(
        meter: Arc<Meter>,
        processor: impl Processor + 'static,
        exporter: impl Exporter + 'static,
        config: ControllerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                meter,
                pipeline: Mutex::new(Pipeline {
                    processor: Box::new(processor),
                    exporter: Box::new(exporter),
                }),
                config,
                stop: Mutex::new(false),
                wake: Condvar::new(),
            }),
            worker: Mutex::new(None),
        })
    }

    pub fn meter(&self) -> &Arc<Meter> {
        &self.shared.meter
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Start the background loop. Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return false;
        }

        *self.shared.stop.lock() = false;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("tally-push".to_string())
            .spawn(move || shared.run());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!(
                    meter = %self.shared.meter.name(),
                    period_ms = self.shared.config.period.as_millis() as u64,
                    timeout_ms = self.shared.config.timeout.as_millis() as u64,
                    "push controller started"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn push controller thread");
                false
            }
        }
    }

    /// Stop the loop, wait for it to exit, then flush with one final tick.
    ///
    /// Returns `false` if the controller was not running.
    pub fn stop(&self) -> bool {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return false;
        };

        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            tracing::error!("push controller thread panicked");
        }

        let flushed = self.shared.tick();
        tracing::info!(
            meter = %self.shared.meter.name(),
            flushed,
            "push controller stopped"
        );
        true
    }

    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Run one collect → process → export cycle on the calling thread.
    ///
    /// Returns the number of records handed to the exporter.
    pub fn tick(&self) -> usize {
        self.shared.tick()
    }

    /// Period between ticks.
    pub fn period(&self) -> Duration {
        self.shared.config.period
    }
}

impl Drop for PushController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PushController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushController")
            .field("meter", &self.shared.meter.name())
            .field("config", &self.shared.config)
            .field("active", &self.is_active())
            .finish()
    }
}
