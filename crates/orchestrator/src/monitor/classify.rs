#![forbid(unsafe_code)]

use config::{FileAction, SuspicionLevel, SuspicionPolicy};

/// Event bits of the fanotify ABI (`linux/fanotify.h`).
pub mod mask {
    pub const FAN_MODIFY: u64 = 0x0000_0002;
    pub const FAN_ATTRIB: u64 = 0x0000_0004;
    pub const FAN_CLOSE_WRITE: u64 = 0x0000_0008;
    pub const FAN_CLOSE_NOWRITE: u64 = 0x0000_0010;
    pub const FAN_OPEN: u64 = 0x0000_0020;
    pub const FAN_MOVED_FROM: u64 = 0x0000_0040;
    pub const FAN_MOVED_TO: u64 = 0x0000_0080;
    pub const FAN_CREATE: u64 = 0x0000_0100;
    pub const FAN_DELETE: u64 = 0x0000_0200;
    pub const FAN_Q_OVERFLOW: u64 = 0x0000_4000;
    pub const FAN_EVENT_ON_CHILD: u64 = 0x0800_0000;
    pub const FAN_RENAME: u64 = 0x1000_0000;
    pub const FAN_ONDIR: u64 = 0x4000_0000;

    /// Everything a mount monitor subscribes to.
    pub const WATCH: u64 = FAN_OPEN
        | FAN_CREATE
        | FAN_MODIFY
        | FAN_MOVED_TO
        | FAN_MOVED_FROM
        | FAN_RENAME
        | FAN_DELETE
        | FAN_ATTRIB
        | FAN_CLOSE_WRITE
        | FAN_CLOSE_NOWRITE
        | FAN_ONDIR
        | FAN_EVENT_ON_CHILD;
}

// First match wins. A kernel record may merge several events on the same
// object, only the highest ranked one is reported.
const PRECEDENCE: [(u64, FileAction); 10] = [
    (mask::FAN_OPEN, FileAction::Open),
    (mask::FAN_CREATE, FileAction::Create),
    (mask::FAN_DELETE, FileAction::Delete),
    (mask::FAN_MOVED_FROM, FileAction::MovedFrom),
    (mask::FAN_MOVED_TO, FileAction::MovedTo),
    (mask::FAN_RENAME, FileAction::Rename),
    (mask::FAN_ATTRIB, FileAction::AttributeChange),
    (mask::FAN_CLOSE_WRITE, FileAction::WriteClose),
    (mask::FAN_CLOSE_NOWRITE, FileAction::ReadClose),
    (mask::FAN_MODIFY, FileAction::WriteModify),
];

/// Map an event bitmask to the single action it is reported as, if any.
pub fn classify(bits: u64) -> Option<FileAction> {
    PRECEDENCE
        .iter()
        .find(|(bit, _)| bits & bit != 0)
        .map(|(_, action)| *action)
}

/// Classifies event masks and tags them with the configured suspicion level.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: SuspicionPolicy,
}

impl Classifier {
    pub fn new(policy: SuspicionPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, bits: u64) -> Option<(FileAction, SuspicionLevel)> {
        let action = classify(bits)?;
        Some((action, self.policy.level(action)))
    }
}
