#![forbid(unsafe_code)]

mod detector;

pub use detector::{DetectorState, UsbDetector, fold_usb_devices};
