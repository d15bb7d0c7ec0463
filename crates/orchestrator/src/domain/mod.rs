#![forbid(unsafe_code)]

mod block_device;
mod usb;

pub use block_device::{BlockDeviceList, BlockDeviceRecord, USB_TRANSPORT};
pub use usb::{Fingerprint, Partition, UsbDevice};
