#![forbid(unsafe_code)]

use serde::Deserialize;

/// Transport reported by the enumerator for removable USB storage.
pub const USB_TRANSPORT: &str = "usb";

/// One node of the enumerated block device tree, as reported by `lsblk -J`.
///
/// Physical devices sit at the top level and their partitions nest under
/// `children`, possibly several levels deep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawBlockDevice")]
pub struct BlockDeviceRecord {
    pub name: String,
    pub transport: Option<String>,
    pub mountpoints: Vec<String>,
    pub children: Vec<BlockDeviceRecord>,
}

impl BlockDeviceRecord {
    pub fn is_usb(&self) -> bool {
        self.transport.as_deref() == Some(USB_TRANSPORT)
    }
}

/// The document root printed by the enumerator.
#[derive(Debug, Deserialize)]
pub struct BlockDeviceList {
    #[serde(default)]
    pub blockdevices: Vec<BlockDeviceRecord>,
}

// Newer lsblk releases print `mountpoints` as an array that contains `null`
// for unmounted devices, older ones print a single `mountpoint` string.
#[derive(Deserialize)]
struct RawBlockDevice {
    name: String,
    #[serde(default)]
    tran: Option<String>,
    #[serde(default)]
    mountpoints: Option<Vec<Option<String>>>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    children: Option<Vec<BlockDeviceRecord>>,
}

impl From<RawBlockDevice> for BlockDeviceRecord {
    fn from(raw: RawBlockDevice) -> Self {
        let mountpoints = match raw.mountpoints {
            Some(list) => list.into_iter().flatten().collect(),
            None => raw.mountpoint.into_iter().collect(),
        };
        Self {
            name: raw.name,
            transport: raw.tran,
            mountpoints,
            children: raw.children.unwrap_or_default(),
        }
    }
}
