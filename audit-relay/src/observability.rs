//! Tracing initialization

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;

/// Initialize JSON-formatted tracing with the configured log level
///
/// Safe to call more than once; later calls leave the existing subscriber
/// in place.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.service.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();

    match result {
        Ok(()) => tracing::info!("Tracing initialized for service: {}", config.service.name),
        Err(_) => tracing::debug!("Tracing subscriber already installed"),
    }

    Ok(())
}
