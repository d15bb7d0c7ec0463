#![forbid(unsafe_code)]

use crate::audit::{ActivityEntry, AuditRecord, AuditSink};
use crate::clock::Clock;
use crate::enumeration::{Enumerator, mounted_usb_paths};
use crate::error::Error;
use crate::monitor::classify::{Classifier, mask};
use crate::monitor::record::{RawEvent, decode_events};
use crate::monitor::{EventSource, SubscriptionFactory};
use config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Upper bound on reads per wake-up so a busy device cannot starve the
/// liveness check.
const MAX_READS_PER_TICK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initializing,
    Watching,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The mount point no longer belongs to an attached USB partition.
    Unmounted,
    /// Shutdown was requested.
    Cancelled,
}

/// Collaborators and settings shared by all mount monitors.
#[derive(Clone)]
pub struct MonitorContext {
    pub enumerator: Arc<dyn Enumerator>,
    pub sink: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    pub classifier: Classifier,
    pub liveness_interval: Duration,
    pub read_interval: Duration,
    pub read_buffer_size: usize,
}

impl MonitorContext {
    pub fn new(
        config: &Config,
        enumerator: Arc<dyn Enumerator>,
        sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            enumerator,
            sink,
            clock,
            classifier: Classifier::new(config.suspicion.clone()),
            liveness_interval: config.monitor.liveness_interval,
            read_interval: config.monitor.read_interval,
            read_buffer_size: config.monitor.read_buffer_size,
        }
    }
}

/// Watches the file activity below one mount point until the mount point
/// disappears or shutdown is requested.
pub struct MountMonitor {
    mount: PathBuf,
    source: Option<Box<dyn EventSource>>,
    ctx: MonitorContext,
    state: MonitorState,
    buf: Vec<u8>,
}

impl MountMonitor {
    /// Validate `mount` and subscribe to its events.
    ///
    /// A monitor that fails here never reaches [`MonitorState::Watching`] and
    /// holds no kernel resources.
    pub fn start(
        mount: impl Into<PathBuf>,
        factory: &dyn SubscriptionFactory,
        ctx: MonitorContext,
    ) -> Result<Self, Error> {
        let mount = mount.into();
        validate_mount(&mount)?;
        let source = factory.subscribe(&mount)?;
        let buf = vec![0u8; ctx.read_buffer_size.max(1)];
        Ok(Self {
            mount,
            source: Some(source),
            ctx,
            state: MonitorState::Watching,
            buf,
        })
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Interleave event reads with liveness checks until the mount point is
    /// gone or `cancel` fires. The subscription is released on every exit.
    pub async fn run(mut self, cancel: CancellationToken) -> StopReason {
        info!(mount = %self.mount.display(), "monitoring started");

        let mut liveness = interval(self.ctx.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reads = interval(self.ctx.read_interval);
        reads.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = liveness.tick() => {
                    if !still_mounted(self.ctx.enumerator.as_ref(), &self.mount).await {
                        break StopReason::Unmounted;
                    }
                }
                _ = reads.tick() => {
                    self.drain();
                }
            }
        };

        self.stop();
        info!(mount = %self.mount.display(), ?reason, "monitoring stopped");
        reason
    }

    /// Read and report everything queued right now. Returns the number of
    /// audit records emitted.
    pub fn drain(&mut self) -> usize {
        let mut emitted = 0;
        for _ in 0..MAX_READS_PER_TICK {
            let Some(source) = self.source.as_mut() else {
                break;
            };
            let n = match source.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => n.min(self.buf.len()),
                Err(err) => {
                    warn!(mount = %self.mount.display(), %err, "event read failed");
                    break;
                }
            };

            for record in decode_events(&self.buf[..n]) {
                match record {
                    Ok(event) => {
                        if self.emit(&event) {
                            emitted += 1;
                        }
                    }
                    Err(err) => {
                        warn!(mount = %self.mount.display(), %err, "skipping undecodable event");
                    }
                }
            }
        }
        emitted
    }

    fn emit(&self, event: &RawEvent) -> bool {
        if event.mask & mask::FAN_Q_OVERFLOW != 0 {
            warn!(mount = %self.mount.display(), "kernel event queue overflowed, events were lost");
        }
        let Some((action, suspicion)) = self.ctx.classifier.classify(event.mask) else {
            return false;
        };

        let entry = ActivityEntry::new(
            self.ctx.clock.now(),
            &self.mount,
            action,
            suspicion,
            event.pid,
        );
        if let Err(err) = self.ctx.sink.record(&AuditRecord::Activity(entry)) {
            error!(
                mount = %self.mount.display(),
                %action,
                %suspicion,
                pid = event.pid,
                %err,
                "audit record lost"
            );
        }
        true
    }

    /// Release the subscription. Later calls do nothing.
    pub fn stop(&mut self) {
        if let Some(source) = self.source.take()
            && let Err(err) = source.close()
        {
            warn!(mount = %self.mount.display(), %err, "failed to release subscription");
        }
        self.state = MonitorState::Stopped;
    }
}

impl Drop for MountMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn still_mounted(enumerator: &dyn Enumerator, mount: &Path) -> bool {
    match enumerator.enumerate().await {
        Ok(records) => mounted_usb_paths(&records).contains(mount),
        Err(err) => {
            // Inconclusive, retried on the next tick.
            warn!(mount = %mount.display(), %err, "liveness check failed");
            true
        }
    }
}

fn validate_mount(mount: &Path) -> Result<(), Error> {
    match std::fs::metadata(mount) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory(mount.to_path_buf())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::PathNotFound(mount.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}
