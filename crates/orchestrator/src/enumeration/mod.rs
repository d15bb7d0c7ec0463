#![forbid(unsafe_code)]

mod lsblk;

pub use lsblk::{LsblkEnumerator, parse_lsblk};

use crate::domain::{BlockDeviceRecord, UsbDevice};
use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;

#[async_trait]
pub trait Enumerator: Send + Sync {
    /// List the block device tree as the operating system currently sees it.
    async fn enumerate(&self) -> Result<Vec<BlockDeviceRecord>, Error>;
}

/// Mount paths that currently belong to partitions of USB devices.
pub fn mounted_usb_paths(records: &[BlockDeviceRecord]) -> HashSet<PathBuf> {
    records
        .iter()
        .filter_map(UsbDevice::from_record)
        .flat_map(|usb| usb.mountpoints().map(PathBuf::from).collect::<Vec<_>>())
        .collect()
}
