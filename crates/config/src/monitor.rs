use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

/// How much of the filesystem a mount monitor subscribes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkScope {
    /// Every file on the filesystem backing the mount point. Covers nested
    /// directories of any depth.
    #[serde(rename = "filesystem")]
    Filesystem,

    /// The mount directory itself and its direct children only.
    #[serde(rename = "inode")]
    Inode,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Monitor {
    /// How often block devices are enumerated and diffed against the last
    /// known snapshot. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,

    /// How often each mount monitor checks that its mount point still belongs
    /// to an attached USB partition. This bounds how long a monitor outlives
    /// its device. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub liveness_interval: Duration,

    /// Back-off between non-blocking reads of an empty event queue.
    /// **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub read_interval: Duration,

    /// Size of the buffer handed to each kernel read.
    pub read_buffer_size: usize,

    /// Upper bound for a single invocation of the enumeration program. Expiry
    /// is treated like any other enumeration failure and retried on the next
    /// poll. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub enumerate_timeout: Duration,

    /// How long shutdown waits for running monitors to release their
    /// subscriptions. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub drain_timeout: Duration,

    /// The block device listing program. It is invoked as
    /// `lsblk -J -o NAME,MOUNTPOINTS,TRAN`.
    pub lsblk: PathBuf,

    /// See [`MarkScope`].
    pub mark_scope: MarkScope,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            liveness_interval: Duration::from_secs(1),
            read_interval: Duration::from_millis(100),
            read_buffer_size: 4096,
            enumerate_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
            lsblk: PathBuf::from("lsblk"),
            mark_scope: MarkScope::Filesystem,
        }
    }
}
