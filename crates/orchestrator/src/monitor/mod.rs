#![forbid(unsafe_code)]

//! Per-mount filesystem activity monitoring.

mod classify;
#[cfg(target_os = "linux")]
mod fanotify;
mod mount_monitor;
pub mod record;
mod subscription;

pub use classify::{Classifier, classify, mask};
#[cfg(target_os = "linux")]
pub use fanotify::FanotifyFactory;
pub use mount_monitor::{MonitorContext, MonitorState, MountMonitor, StopReason};
pub use record::{RawEvent, decode_events};
pub use subscription::{EventSource, SubscriptionFactory, UnsupportedPlatform};
