//! Process-wide meter provider.
//!
//! The application entry point installs a provider once with
//! [`set_meter_provider`]; library code reads it with [`meter_provider`] or
//! [`meter`]. Reading before installation lazily installs an empty default
//! provider, after which [`set_meter_provider`] fails.

use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::meter::Meter;
use crate::provider::MeterProvider;

static GLOBAL_PROVIDER: OnceLock<Arc<MeterProvider>> = OnceLock::new();

/// Install the process-wide provider.
///
/// Fails with [`Error::ProviderAlreadyInitialized`] if a provider is already in place.
pub fn set_meter_provider(provider: Arc<MeterProvider>) -> Result<()> {
    GLOBAL_PROVIDER
        .set(provider)
        .map_err(|_| Error::ProviderAlreadyInitialized)?;
    tracing::debug!("installed global meter provider");
    Ok(())
}

/// The process-wide provider.
pub fn meter_provider() -> Arc<MeterProvider> {
    Arc::clone(GLOBAL_PROVIDER.get_or_init(|| Arc::new(MeterProvider::new())))
}

/// Shorthand for `meter_provider().meter(name)`.
pub fn meter(name: &str) -> Arc<Meter> {
    meter_provider().meter(name)
}
