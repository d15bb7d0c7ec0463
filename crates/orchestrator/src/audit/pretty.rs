#![forbid(unsafe_code)]

use crate::audit::{AuditRecord, AuditSink};
use crate::error::Error;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Writes records as human readable lines.
#[derive(Debug)]
pub struct PrettyAuditLog<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> PrettyAuditLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

fn render(record: &AuditRecord) -> String {
    match record {
        AuditRecord::Activity(entry) => format!(
            "[{}][{}] {} ({})\n",
            entry.timestamp.format(TIME_FORMAT),
            entry.mount.display(),
            entry.message,
            entry.suspicion
        ),
        AuditRecord::Cpu(entry) => {
            let mut line = format!(
                "[{}] Average CPU Load: {:5.1}% |",
                entry.timestamp.format(TIME_FORMAT),
                entry.average
            );
            for (core, load) in entry.per_core.iter().enumerate() {
                let _ = write!(line, " Core{}: {:5.1}%", core + 1, load);
            }
            line.push('\n');
            line
        }
    }
}

impl<W: Write + Send> AuditSink for PrettyAuditLog<W> {
    fn record(&self, record: &AuditRecord) -> Result<(), Error> {
        let line = render(record);
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        out.write_all(line.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|err| Error::LoggerWrite(err.to_string()))
    }
}
