#![forbid(unsafe_code)]

use crate::audit::{AuditRecord, AuditSink};
use crate::error::Error;
use std::io::Write;
use std::sync::Mutex;

/// Writes each record as a single line of JSON.
#[derive(Debug)]
pub struct JsonAuditLog<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonAuditLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> AuditSink for JsonAuditLog<W> {
    fn record(&self, record: &AuditRecord) -> Result<(), Error> {
        let mut line =
            serde_json::to_vec(record).map_err(|err| Error::LoggerWrite(err.to_string()))?;
        line.push(b'\n');

        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        out.write_all(&line)
            .and_then(|()| out.flush())
            .map_err(|err| Error::LoggerWrite(err.to_string()))
    }
}
