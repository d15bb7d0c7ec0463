#![forbid(unsafe_code)]

use crate::error::Error;
use crate::monitor::SubscriptionFactory;
use config::Config;
use std::sync::Arc;

/// The kernel filesystem-event backend for the running platform.
#[cfg(target_os = "linux")]
pub fn subscription_factory(config: &Config) -> Result<Arc<dyn SubscriptionFactory>, Error> {
    Ok(Arc::new(crate::monitor::FanotifyFactory::new(config)))
}

/// The kernel filesystem-event backend for the running platform.
#[cfg(not(target_os = "linux"))]
pub fn subscription_factory(_config: &Config) -> Result<Arc<dyn SubscriptionFactory>, Error> {
    Err(Error::UnsupportedPlatform(std::env::consts::OS))
}
