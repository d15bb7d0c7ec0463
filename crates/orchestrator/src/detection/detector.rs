#![forbid(unsafe_code)]

use crate::domain::{BlockDeviceRecord, Fingerprint, UsbDevice};
use crate::enumeration::Enumerator;
use crate::error::Error;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Keep only USB devices and fold their partition trees.
pub fn fold_usb_devices(records: &[BlockDeviceRecord]) -> Vec<UsbDevice> {
    records.iter().filter_map(UsbDevice::from_record).collect()
}

/// The last successfully enumerated USB snapshot, keyed by fingerprint.
#[derive(Debug, Default)]
pub struct DetectorState {
    existing: HashMap<Fingerprint, UsbDevice>,
}

impl DetectorState {
    /// Return the devices of `output` whose fingerprint was not present in the
    /// previous snapshot, then make `output` the new baseline.
    ///
    /// Removal is not reported here. A device that vanished and came back
    /// between two calls is reported again.
    pub fn diff(&mut self, output: Vec<UsbDevice>) -> Vec<UsbDevice> {
        let keyed: Vec<(Fingerprint, UsbDevice)> = output
            .into_iter()
            .map(|usb| (usb.fingerprint(), usb))
            .collect();

        let new: Vec<UsbDevice> = keyed
            .iter()
            .filter(|(key, _)| !self.existing.contains_key(key))
            .map(|(_, usb)| usb.clone())
            .collect();

        self.existing = keyed.into_iter().collect();
        new
    }

    pub fn existing(&self) -> impl Iterator<Item = &UsbDevice> {
        self.existing.values()
    }
}

/// Enumerates block devices and reports newly arrived USB devices.
pub struct UsbDetector {
    enumerator: Arc<dyn Enumerator>,
    state: DetectorState,
}

impl UsbDetector {
    pub fn new(enumerator: Arc<dyn Enumerator>) -> Self {
        Self {
            enumerator,
            state: DetectorState::default(),
        }
    }

    /// The currently attached USB devices.
    pub async fn snapshot(&self) -> Result<Vec<UsbDevice>, Error> {
        let records = self.enumerator.enumerate().await?;
        Ok(fold_usb_devices(&records))
    }

    /// Snapshot and diff in one step. An enumeration error leaves the baseline
    /// untouched.
    pub async fn poll(&mut self) -> Result<Vec<UsbDevice>, Error> {
        let output = self.snapshot().await?;
        let new = self.state.diff(output);
        if !new.is_empty() {
            debug!(
                devices = ?new.iter().map(|usb| usb.name.as_str()).collect::<Vec<_>>(),
                "new usb devices"
            );
        }
        Ok(new)
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }
}
