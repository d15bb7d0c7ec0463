use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format of an audit log file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// One JSON object per line. Suited for shipping to a collector.
    #[serde(rename = "json")]
    Json,

    /// Human readable lines.
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    /// Directory holding the audit logs. Created on startup if missing.
    pub directory: PathBuf,

    /// Format of the USB file activity log.
    pub usb_format: LogFormat,

    /// Format of the CPU load log.
    pub cpu_format: LogFormat,

    /// File name of the USB file activity log, relative to `directory`.
    pub usb_file: PathBuf,

    /// File name of the CPU load log, relative to `directory`.
    pub cpu_file: PathBuf,
}

impl Logging {
    pub fn usb_path(&self) -> PathBuf {
        self.directory.join(&self.usb_file)
    }

    pub fn cpu_path(&self) -> PathBuf {
        self.directory.join(&self.cpu_file)
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/log/airgapd"),
            usb_format: LogFormat::Json,
            cpu_format: LogFormat::Pretty,
            usb_file: PathBuf::from("usb_traffic.log"),
            cpu_file: PathBuf::from("cpu_load.log"),
        }
    }
}
