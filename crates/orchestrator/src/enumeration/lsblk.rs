#![forbid(unsafe_code)]

use crate::domain::{BlockDeviceList, BlockDeviceRecord};
use crate::enumeration::Enumerator;
use crate::error::Error;
use async_trait::async_trait;
use config::Config;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

const LSBLK_ARGS: &[&str] = &["-J", "-o", "NAME,MOUNTPOINTS,TRAN"];

/// Enumerates block devices by running `lsblk` in JSON mode.
#[derive(Debug, Clone)]
pub struct LsblkEnumerator {
    program: PathBuf,
    timeout: Duration,
}

impl LsblkEnumerator {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.monitor.lsblk.clone(),
            timeout: config.monitor.enumerate_timeout,
        }
    }
}

#[async_trait]
impl Enumerator for LsblkEnumerator {
    async fn enumerate(&self) -> Result<Vec<BlockDeviceRecord>, Error> {
        let child = Command::new(&self.program)
            .args(LSBLK_ARGS)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::Enumeration(format!("cannot run {}: {err}", self.program.display()))
            })?;

        // Dropping the pending future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::EnumerationTimeout(self.timeout))??;

        if !output.status.success() {
            return Err(Error::Enumeration(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let records = parse_lsblk(&output.stdout)?;
        trace!(devices = records.len(), "block devices enumerated");
        Ok(records)
    }
}

/// Parse the `{ "blockdevices": [...] }` document printed by `lsblk -J`.
pub fn parse_lsblk(stdout: &[u8]) -> Result<Vec<BlockDeviceRecord>, Error> {
    let list: BlockDeviceList = serde_json::from_slice(stdout)?;
    Ok(list.blockdevices)
}
