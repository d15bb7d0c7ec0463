//! In-crate doubles for the enumerator, subscription and sink seams.

use crate::audit::{ActivityEntry, AuditRecord, AuditSink, CpuEntry};
use crate::domain::BlockDeviceRecord;
use crate::enumeration::Enumerator;
use crate::error::Error;
use crate::monitor::{EventSource, SubscriptionFactory};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A USB device `name` with one partition per mount point.
pub fn usb_records(name: &str, mounts: &[&str]) -> Vec<BlockDeviceRecord> {
    let children = mounts
        .iter()
        .enumerate()
        .map(|(idx, mount)| BlockDeviceRecord {
            name: format!("{name}{}", idx + 1),
            transport: None,
            mountpoints: vec![(*mount).to_owned()],
            children: Vec::new(),
        })
        .collect();
    vec![BlockDeviceRecord {
        name: name.to_owned(),
        transport: Some("usb".to_owned()),
        mountpoints: Vec::new(),
        children,
    }]
}

/// Returns whatever snapshot was last set.
pub struct ScriptedEnumerator {
    next: Mutex<Result<Vec<BlockDeviceRecord>, String>>,
    calls: AtomicUsize,
}

impl ScriptedEnumerator {
    pub fn new(records: Vec<BlockDeviceRecord>) -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Ok(records)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        let enumerator = Self::new(Vec::new());
        enumerator.fail("lsblk exploded");
        enumerator
    }

    pub fn set(&self, records: Vec<BlockDeviceRecord>) {
        *self.next.lock().unwrap() = Ok(records);
    }

    pub fn fail(&self, reason: &str) {
        *self.next.lock().unwrap() = Err(reason.to_owned());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enumerator for ScriptedEnumerator {
    async fn enumerate(&self) -> Result<Vec<BlockDeviceRecord>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next.lock().unwrap().clone().map_err(Error::Enumeration)
    }
}

#[derive(Default)]
struct FakeShared {
    batches: Mutex<VecDeque<Vec<u8>>>,
    subscribed: AtomicUsize,
    closed: AtomicUsize,
}

/// Hands out sources that replay pushed batches, one batch per read.
#[derive(Default, Clone)]
pub struct FakeFactory {
    shared: Arc<FakeShared>,
    fail: bool,
}

impl FakeFactory {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn push(&self, batch: Vec<u8>) {
        self.shared.batches.lock().unwrap().push_back(batch);
    }

    pub fn subscriptions(&self) -> usize {
        self.shared.subscribed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl SubscriptionFactory for FakeFactory {
    fn subscribe(&self, _mount: &Path) -> Result<Box<dyn EventSource>, Error> {
        if self.fail {
            return Err(Error::SubscriptionInit("operation not permitted".into()));
        }
        self.shared.subscribed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            shared: self.shared.clone(),
        }))
    }
}

struct FakeSource {
    shared: Arc<FakeShared>,
}

impl EventSource for FakeSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let Some(batch) = self.shared.batches.lock().unwrap().pop_front() else {
            return Ok(0);
        };
        let n = batch.len().min(buf.len());
        buf[..n].copy_from_slice(&batch[..n]);
        Ok(n)
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps every record in memory, or rejects all of them.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AuditRecord>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn activities(&self) -> Vec<ActivityEntry> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|record| match record {
                AuditRecord::Activity(entry) => Some(entry.clone()),
                AuditRecord::Cpu(_) => None,
            })
            .collect()
    }

    pub fn cpu(&self) -> Vec<CpuEntry> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|record| match record {
                AuditRecord::Cpu(entry) => Some(entry.clone()),
                AuditRecord::Activity(_) => None,
            })
            .collect()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, record: &AuditRecord) -> Result<(), Error> {
        if self.fail {
            return Err(Error::LoggerWrite("disk full".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
