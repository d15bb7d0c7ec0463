use serde::{Deserialize, Serialize};
use std::fmt;

/// A file operation observed on a watched mount point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Open,
    Create,
    Delete,
    MovedFrom,
    MovedTo,
    Rename,
    #[serde(rename = "attrib")]
    AttributeChange,
    #[serde(rename = "close_write")]
    WriteClose,
    #[serde(rename = "close_nowrite")]
    ReadClose,
    #[serde(rename = "modify")]
    WriteModify,
}

impl FileAction {
    pub const ALL: [FileAction; 10] = [
        FileAction::Open,
        FileAction::Create,
        FileAction::Delete,
        FileAction::MovedFrom,
        FileAction::MovedTo,
        FileAction::Rename,
        FileAction::AttributeChange,
        FileAction::WriteClose,
        FileAction::ReadClose,
        FileAction::WriteModify,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FileAction::Open => "Open",
            FileAction::Create => "Create",
            FileAction::Delete => "Delete",
            FileAction::MovedFrom => "Moved FROM",
            FileAction::MovedTo => "Moved TO",
            FileAction::Rename => "Rename",
            FileAction::AttributeChange => "Attribute change",
            FileAction::WriteClose => "Write close",
            FileAction::ReadClose => "Read close",
            FileAction::WriteModify => "Write",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse review priority attached to every audited action.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionLevel {
    Suspicious,
    Normal,
}

impl fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspicionLevel::Suspicious => f.write_str("suspicious"),
            SuspicionLevel::Normal => f.write_str("normal"),
        }
    }
}

/// Action to suspicion mapping.
///
/// By default everything that can change what is stored on the device is
/// suspicious (creation, writes, deletion, renames and moves), while pure
/// reads and metadata updates are normal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuspicionPolicy {
    pub open: SuspicionLevel,
    pub create: SuspicionLevel,
    pub delete: SuspicionLevel,
    pub moved_from: SuspicionLevel,
    pub moved_to: SuspicionLevel,
    pub rename: SuspicionLevel,
    pub attrib: SuspicionLevel,
    pub close_write: SuspicionLevel,
    pub close_nowrite: SuspicionLevel,
    pub modify: SuspicionLevel,
}

impl SuspicionPolicy {
    pub fn level(&self, action: FileAction) -> SuspicionLevel {
        match action {
            FileAction::Open => self.open,
            FileAction::Create => self.create,
            FileAction::Delete => self.delete,
            FileAction::MovedFrom => self.moved_from,
            FileAction::MovedTo => self.moved_to,
            FileAction::Rename => self.rename,
            FileAction::AttributeChange => self.attrib,
            FileAction::WriteClose => self.close_write,
            FileAction::ReadClose => self.close_nowrite,
            FileAction::WriteModify => self.modify,
        }
    }
}

impl Default for SuspicionPolicy {
    fn default() -> Self {
        use SuspicionLevel::{Normal, Suspicious};
        Self {
            open: Normal,
            create: Suspicious,
            delete: Suspicious,
            moved_from: Suspicious,
            moved_to: Suspicious,
            rename: Suspicious,
            attrib: Normal,
            close_write: Suspicious,
            close_nowrite: Normal,
            modify: Suspicious,
        }
    }
}
