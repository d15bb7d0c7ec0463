#![forbid(unsafe_code)]

use super::BlockDeviceRecord;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    /// Where the partition is mounted. May be empty, or hold several paths
    /// for bind mounts.
    pub mountpoints: Vec<PathBuf>,
}

/// One physical removable device as currently enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    pub name: String,
    pub partitions: Vec<Partition>,
}

/// Identity of a USB device across polls.
///
/// Derived from the device name, the partition count and a SHA-256 over the
/// sorted, `|`-joined mount paths of all partitions. The same device with the
/// same mounted paths always yields the same fingerprint regardless of the
/// order the paths were reported in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl UsbDevice {
    /// Fold an enumerated top-level device into a `UsbDevice`.
    ///
    /// Returns `None` unless the device's transport is USB. Every descendant
    /// becomes a partition, including ones without any mount point, and empty
    /// mount path strings are dropped.
    pub fn from_record(record: &BlockDeviceRecord) -> Option<Self> {
        if !record.is_usb() {
            return None;
        }
        let mut partitions = Vec::new();
        collect_partitions(&record.children, &mut partitions);
        Some(Self {
            name: record.name.clone(),
            partitions,
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut paths: Vec<String> = self
            .mountpoints()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        paths.sort();

        let digest = Sha256::digest(paths.join("|").as_bytes());
        Fingerprint(format!(
            "{}-{}-{}",
            self.name,
            self.partitions.len(),
            hex::encode(digest)
        ))
    }

    /// All mount paths across all partitions, in partition order.
    pub fn mountpoints(&self) -> impl Iterator<Item = &Path> {
        self.partitions
            .iter()
            .flat_map(|partition| partition.mountpoints.iter().map(PathBuf::as_path))
    }
}

fn collect_partitions(children: &[BlockDeviceRecord], out: &mut Vec<Partition>) {
    for child in children {
        out.push(Partition {
            name: child.name.clone(),
            mountpoints: child
                .mountpoints
                .iter()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .collect(),
        });
        // Leaves have no children and end the recursion.
        collect_partitions(&child.children, out);
    }
}
