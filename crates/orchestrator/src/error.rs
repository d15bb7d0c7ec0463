#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("block device enumeration failed: {0}")]
    Enumeration(String),

    #[error("block device enumeration did not finish within {0:?}")]
    EnumerationTimeout(Duration),

    #[error("malformed enumeration output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("fanotify initialization failed: {0}")]
    SubscriptionInit(String),

    #[error("fanotify mark on {} failed: {reason}", .path.display())]
    SubscriptionMark { path: PathBuf, reason: String },

    #[error("failed to read kernel events: {0}")]
    SubscriptionRead(String),

    #[error("failed to decode kernel event: {0}")]
    EventDecode(#[from] DecodeError),

    #[error("failed to write audit log: {0}")]
    LoggerWrite(String),

    #[error("kernel filesystem events are not supported on {0}")]
    UnsupportedPlatform(&'static str),

    #[error("failed to read procfs info: {0}")]
    Procfs(#[from] procfs::ProcError),

    #[error("configuration error: {0}")]
    Config(#[from] config::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a raw event buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{remaining} trailing bytes are shorter than an event header")]
    Truncated { remaining: usize },

    #[error("event length {event_len} is outside the {remaining} bytes left in the buffer")]
    BadLength { event_len: usize, remaining: usize },

    #[error("unsupported metadata version {found}, expected {expected}")]
    Version { found: u8, expected: u8 },
}
