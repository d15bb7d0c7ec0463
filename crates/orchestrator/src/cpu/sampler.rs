#![forbid(unsafe_code)]

use super::{CpuSource, CpuTimes, CpuWindow, utilization};
use crate::audit::{AuditRecord, AuditSink, CpuEntry};
use crate::clock::Clock;
use crate::error::Error;
use config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodically records system CPU load to the CPU audit log.
pub struct CpuSampler<S> {
    source: S,
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    previous: Option<CpuTimes>,
    window: CpuWindow,
}

impl<S: CpuSource> CpuSampler<S> {
    pub fn new(config: &Config, source: S, sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            sink,
            clock,
            interval: config.cpu.interval,
            previous: None,
            window: CpuWindow::new(config.cpu.window),
        }
    }

    /// Take one reading. The first call only establishes the baseline and
    /// returns `None`.
    pub fn sample(&mut self) -> Result<Option<CpuEntry>, Error> {
        let current = self.source.read()?;
        let Some(previous) = self.previous.replace(current.clone()) else {
            return Ok(None);
        };

        let per_core = previous
            .cores
            .iter()
            .zip(&current.cores)
            .map(|(prev, cur)| utilization(*prev, *cur))
            .collect();
        let entry = CpuEntry {
            timestamp: self.clock.now(),
            average: utilization(previous.total, current.total),
            per_core,
        };
        self.window.push(entry.clone());
        Ok(Some(entry))
    }

    pub fn window(&self) -> &CpuWindow {
        &self.window
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval = ?self.interval, "cpu sampling started");
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sample() {
                Ok(Some(entry)) => {
                    debug!(average = entry.average, window_mean = ?self.window.mean(), "cpu sample");
                    if let Err(err) = self.sink.record(&AuditRecord::Cpu(entry)) {
                        error!(%err, "cpu record lost");
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "failed to read cpu counters"),
            }
        }
        info!("cpu sampling stopped");
    }
}
