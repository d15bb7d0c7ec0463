#![forbid(unsafe_code)]

use crate::error::Error;
use std::path::Path;

/// An open kernel filesystem-event subscription.
///
/// Owned by exactly one monitor. Consuming `close` makes a second release
/// impossible.
pub trait EventSource: Send {
    /// Read the next batch of raw records into `buf`. Returns `Ok(0)` when
    /// nothing is queued.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Release the underlying descriptor.
    fn close(self: Box<Self>) -> Result<(), Error>;
}

pub trait SubscriptionFactory: Send + Sync {
    /// Open a subscription reporting file activity below `mount`.
    ///
    /// Fails with [`Error::SubscriptionInit`] when no subscription can be
    /// created and [`Error::SubscriptionMark`] when the watch cannot be
    /// applied to the path.
    fn subscribe(&self, mount: &Path) -> Result<Box<dyn EventSource>, Error>;
}

/// Stand-in for platforms without a kernel filesystem-event facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlatform;

impl SubscriptionFactory for UnsupportedPlatform {
    fn subscribe(&self, _mount: &Path) -> Result<Box<dyn EventSource>, Error> {
        Err(Error::UnsupportedPlatform(std::env::consts::OS))
    }
}
