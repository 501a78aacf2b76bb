//! Push controller configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default seconds between collection ticks.
pub const DEFAULT_PERIOD_SECS: f64 = 5.0;

/// Default export timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Timing parameters of a [`PushController`](crate::PushController).
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Time between the end of one tick and the start of the next.
    pub period: Duration,

    /// Upper bound handed to the exporter for each export call.
    pub timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs_f64(DEFAULT_PERIOD_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with the given period.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    /// Create a configuration from a period in (possibly fractional) seconds.
    ///
    /// Fails with [`Error::Config`] for non-finite or non-positive periods.
    pub fn from_secs_f64(period: f64) -> Result<Self> {
        if !period.is_finite() || period <= 0.0 {
            return Err(Error::Config(format!(
                "period must be a positive number of seconds, got {period}"
            )));
        }
        Ok(Self::new(Duration::from_secs_f64(period)))
    }

    /// Set the export timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the export timeout in whole seconds.
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(Error::Config("period must be non-zero".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
