#![forbid(unsafe_code)]

//! Audit trail sinks.
//!
//! Every classified file action and every CPU sample ends up as one
//! [`AuditRecord`] written to an append-only log file. Sinks report write
//! failures to the caller, which logs them through `tracing` and carries on.

mod json;
mod pretty;

pub use json::JsonAuditLog;
pub use pretty::PrettyAuditLog;

use crate::error::Error;
use chrono::{DateTime, Local};
use config::{FileAction, LogFormat, SuspicionLevel};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
}

impl From<SuspicionLevel> for Severity {
    fn from(level: SuspicionLevel) -> Self {
        match level {
            SuspicionLevel::Suspicious => Severity::Warn,
            SuspicionLevel::Normal => Severity::Info,
        }
    }
}

/// A file action observed on a watched mount point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub suspicion: SuspicionLevel,
    pub mount: PathBuf,
    pub action: FileAction,
    pub pid: i32,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(
        timestamp: DateTime<Local>,
        mount: &Path,
        action: FileAction,
        suspicion: SuspicionLevel,
        pid: i32,
    ) -> Self {
        Self {
            timestamp,
            severity: suspicion.into(),
            suspicion,
            mount: mount.to_path_buf(),
            action,
            pid,
            message: format!("{action} detected from PID: {pid}"),
        }
    }
}

/// CPU utilization in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuEntry {
    pub timestamp: DateTime<Local>,
    pub average: f64,
    pub per_core: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Activity(ActivityEntry),
    Cpu(CpuEntry),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), Error>;
}

/// Open (or create) an append-only audit log at `path` in the given format.
pub fn open_sink(format: LogFormat, path: &Path) -> Result<Arc<dyn AuditSink>, Error> {
    let file = open_append(path)?;
    Ok(match format {
        LogFormat::Json => Arc::new(JsonAuditLog::new(file)),
        LogFormat::Pretty => Arc::new(PrettyAuditLog::new(file)),
    })
}

fn open_append(path: &Path) -> Result<File, Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}
