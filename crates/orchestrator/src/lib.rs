#![forbid(unsafe_code)]

pub mod audit;
pub mod clock;
pub mod cpu;
pub mod detection;
pub mod domain;
pub mod engine;
pub mod enumeration;
pub mod error;
pub mod monitor;
pub mod platform;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use audit::{ActivityEntry, AuditRecord, AuditSink, CpuEntry, Severity, open_sink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use cpu::{CpuSampler, CpuSource, ProcfsCpuSource};
pub use detection::{DetectorState, UsbDetector};
pub use domain::{BlockDeviceRecord, Fingerprint, Partition, UsbDevice};
pub use engine::{Orchestrator, Services, TickReport};
pub use enumeration::{Enumerator, LsblkEnumerator};
pub use error::{DecodeError, Error};
pub use monitor::{EventSource, MountMonitor, StopReason, SubscriptionFactory};
pub use registry::{MonitorRegistry, RegistryLease};
