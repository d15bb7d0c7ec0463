#![forbid(unsafe_code)]

use crate::audit::AuditSink;
use crate::clock::Clock;
use crate::detection::UsbDetector;
use crate::enumeration::Enumerator;
use crate::error::Error;
use crate::monitor::{MonitorContext, MountMonitor, SubscriptionFactory};
use crate::registry::MonitorRegistry;
use config::Config;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub struct Services {
    pub enumerator: Arc<dyn Enumerator>,
    pub subscriptions: Arc<dyn SubscriptionFactory>,
    pub sink: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

/// Outcome of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Names of devices that arrived (or changed) since the previous poll.
    pub new_devices: Vec<String>,
    /// Mount points that got a fresh monitor.
    pub started: Vec<PathBuf>,
    /// Mount points of new devices that were already being watched.
    pub already_watched: Vec<PathBuf>,
    /// Mount points whose stale monitor was cancelled in favour of a new one.
    pub replaced: Vec<PathBuf>,
    /// Mount points whose monitor could not start, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Polls for USB arrivals and keeps one monitor running per mounted
/// partition.
pub struct Orchestrator {
    config: Config,
    detector: UsbDetector,
    subscriptions: Arc<dyn SubscriptionFactory>,
    monitor_ctx: MonitorContext,
    registry: MonitorRegistry,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: Config, services: Services) -> Self {
        let monitor_ctx = MonitorContext::new(
            &config,
            services.enumerator.clone(),
            services.sink,
            services.clock,
        );
        Self {
            detector: UsbDetector::new(services.enumerator),
            subscriptions: services.subscriptions,
            monitor_ctx,
            registry: MonitorRegistry::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Execute a single poll: enumerate, diff, and start monitors for the
    /// mount points of newly arrived devices.
    ///
    /// A mount point that was absent from the previous snapshot belongs to a
    /// replugged device even if its old monitor has not noticed the removal
    /// yet. That monitor is cancelled and replaced.
    ///
    /// An enumeration failure aborts the tick before anything changes.
    pub async fn tick(&mut self) -> Result<TickReport, Error> {
        let previously_mounted: HashSet<PathBuf> = self
            .detector
            .state()
            .existing()
            .flat_map(|usb| usb.mountpoints().map(Path::to_path_buf).collect::<Vec<_>>())
            .collect();
        let arrived = self.detector.poll().await?;

        let mut report = TickReport {
            new_devices: arrived.iter().map(|usb| usb.name.clone()).collect(),
            ..TickReport::default()
        };
        for usb in &arrived {
            for mount in usb.mountpoints() {
                let remounted = !previously_mounted.contains(mount);
                self.start_monitor(mount, remounted, &mut report);
            }
        }
        Ok(report)
    }

    fn start_monitor(&self, mount: &Path, remounted: bool, report: &mut TickReport) {
        let cancel = self.shutdown.child_token();
        let lease = if remounted && self.registry.contains(mount) {
            info!(mount = %mount.display(), "mount point reappeared, replacing its monitor");
            report.replaced.push(mount.to_path_buf());
            self.registry.replace(mount, cancel.clone())
        } else {
            match self.registry.claim(mount, cancel.clone()) {
                Some(lease) => lease,
                None => {
                    debug!(mount = %mount.display(), "mount point already watched");
                    report.already_watched.push(mount.to_path_buf());
                    return;
                }
            }
        };

        let monitor = match MountMonitor::start(
            mount,
            self.subscriptions.as_ref(),
            self.monitor_ctx.clone(),
        ) {
            Ok(monitor) => monitor,
            Err(err) => {
                warn!(mount = %mount.display(), %err, "failed to start monitor");
                report.failed.push((mount.to_path_buf(), err.to_string()));
                return;
            }
        };

        self.tracker.spawn(async move {
            let _lease = lease;
            monitor.run(cancel).await
        });
        report.started.push(mount.to_path_buf());
    }

    /// Run ticks until the cancellation token is triggered, then wait for
    /// every monitor to release its subscription.
    pub async fn run_until(&mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.monitor.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if !report.started.is_empty() || !report.failed.is_empty() => {
                            info!(
                                devices = ?report.new_devices,
                                started = report.started.len(),
                                failed = report.failed.len(),
                                active = self.registry.len(),
                                "usb devices attached"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => warn!(%err, "usb poll failed, retrying next tick"),
                    }
                }
            }
        }

        self.drain().await;
    }

    /// Cancel all monitors and wait up to `drain_timeout` for them to stop.
    pub async fn drain(&self) {
        self.shutdown.cancel();
        self.tracker.close();

        let timeout = self.config.monitor.drain_timeout;
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                ?timeout,
                "monitors did not stop in time"
            );
        } else {
            debug!("all monitors stopped");
        }
    }

    /// Mount points with a live monitor.
    pub fn active_monitors(&self) -> Vec<PathBuf> {
        self.registry.active()
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::monitor::{RawEvent, mask};
    use crate::test_support::{FakeFactory, RecordingSink, ScriptedEnumerator, usb_records};
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.monitor.poll_interval = Duration::from_millis(10);
        config.monitor.liveness_interval = Duration::from_millis(10);
        config.monitor.read_interval = Duration::from_millis(5);
        config.monitor.drain_timeout = Duration::from_secs(5);
        config
    }

    fn orchestrator(
        enumerator: Arc<ScriptedEnumerator>,
        factory: &FakeFactory,
        sink: Arc<RecordingSink>,
    ) -> Orchestrator {
        Orchestrator::new(
            test_config(),
            Services {
                enumerator,
                subscriptions: Arc::new(factory.clone()),
                sink,
                clock: Arc::new(SystemClock),
            },
        )
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn tick_starts_one_monitor_per_new_mount() {
        let dir = tempdir().unwrap();
        let mount = dir.path().to_str().unwrap();
        let enumerator = ScriptedEnumerator::new(usb_records("sdb", &[mount]));
        let factory = FakeFactory::default();
        let mut orch = orchestrator(enumerator, &factory, RecordingSink::new());

        let report = orch.tick().await.unwrap();
        assert_eq!(report.new_devices, vec!["sdb".to_string()]);
        assert_eq!(report.started, vec![dir.path().to_path_buf()]);
        assert!(report.failed.is_empty());
        assert_eq!(orch.active_monitors(), vec![dir.path().to_path_buf()]);

        let report = orch.tick().await.unwrap();
        assert_eq!(report, TickReport::default());
        assert_eq!(factory.subscriptions(), 1);

        orch.drain().await;
        assert_eq!(factory.closed(), 1);
        assert!(orch.active_monitors().is_empty());
    }

    #[tokio::test]
    async fn changed_device_keeps_existing_monitor() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let a = first.path().to_str().unwrap();
        let b = second.path().to_str().unwrap();
        let enumerator = ScriptedEnumerator::new(usb_records("sdb", &[a]));
        let factory = FakeFactory::default();
        let mut orch = orchestrator(enumerator.clone(), &factory, RecordingSink::new());

        orch.tick().await.unwrap();
        enumerator.set(usb_records("sdb", &[a, b]));
        let report = orch.tick().await.unwrap();

        assert_eq!(report.started, vec![second.path().to_path_buf()]);
        assert_eq!(report.already_watched, vec![first.path().to_path_buf()]);
        assert_eq!(factory.subscriptions(), 2);
        orch.drain().await;
    }

    #[tokio::test]
    async fn failed_start_is_reported_and_not_registered() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let enumerator =
            ScriptedEnumerator::new(usb_records("sdb", &[missing.to_str().unwrap()]));
        let factory = FakeFactory::default();
        let mut orch = orchestrator(enumerator, &factory, RecordingSink::new());

        let report = orch.tick().await.unwrap();
        assert!(report.started.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, missing);
        assert!(report.failed[0].1.ends_with("does not exist"));
        assert!(orch.registry().is_empty());
        assert_eq!(factory.subscriptions(), 0);
    }

    #[tokio::test]
    async fn enumeration_failure_keeps_baseline() {
        let dir = tempdir().unwrap();
        let mount = dir.path().to_str().unwrap();
        let records = usb_records("sdb", &[mount]);
        let enumerator = ScriptedEnumerator::new(records.clone());
        let factory = FakeFactory::default();
        let mut orch = orchestrator(enumerator.clone(), &factory, RecordingSink::new());

        orch.tick().await.unwrap();
        enumerator.fail("lsblk: timed out");
        assert!(matches!(orch.tick().await, Err(Error::Enumeration(_))));

        enumerator.set(records);
        let report = orch.tick().await.unwrap();
        assert!(report.new_devices.is_empty());
        orch.drain().await;
    }

    #[tokio::test]
    async fn unplug_frees_the_mount_point() {
        let dir = tempdir().unwrap();
        let mount = dir.path().to_str().unwrap();
        let enumerator = ScriptedEnumerator::new(usb_records("sdb", &[mount]));
        let factory = FakeFactory::default();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(enumerator.clone(), &factory, sink.clone());

        orch.tick().await.unwrap();
        factory.push(RawEvent::new(mask::FAN_CLOSE_WRITE, 77).encode());
        wait_until(|| !sink.activities().is_empty()).await;

        enumerator.set(Vec::new());
        let registry = orch.registry().clone();
        wait_until(|| registry.is_empty()).await;
        assert_eq!(factory.closed(), 1);
        assert_eq!(orch.tick().await.unwrap(), TickReport::default());

        // Same mount point comes back on a replug.
        enumerator.set(usb_records("sdb", &[mount]));
        let report = orch.tick().await.unwrap();
        assert_eq!(report.started, vec![dir.path().to_path_buf()]);
        orch.drain().await;
        assert_eq!(factory.closed(), 2);
    }

    #[tokio::test]
    async fn replug_before_liveness_check_replaces_monitor() {
        let dir = tempdir().unwrap();
        let mount = dir.path().to_str().unwrap();
        let enumerator = ScriptedEnumerator::new(usb_records("sdb", &[mount]));
        let factory = FakeFactory::default();
        let mut config = test_config();
        config.monitor.liveness_interval = Duration::from_secs(60);
        let mut orch = Orchestrator::new(
            config,
            Services {
                enumerator: enumerator.clone(),
                subscriptions: Arc::new(factory.clone()),
                sink: RecordingSink::new(),
                clock: Arc::new(SystemClock),
            },
        );

        orch.tick().await.unwrap();
        // Let the monitor run its first liveness check while still mounted.
        tokio::time::sleep(Duration::from_millis(20)).await;

        enumerator.set(Vec::new());
        assert_eq!(orch.tick().await.unwrap(), TickReport::default());

        enumerator.set(usb_records("sdb", &[mount]));
        let report = orch.tick().await.unwrap();
        assert_eq!(report.new_devices, vec!["sdb".to_string()]);
        assert_eq!(report.started, vec![dir.path().to_path_buf()]);
        assert_eq!(report.replaced, vec![dir.path().to_path_buf()]);
        assert!(report.already_watched.is_empty());
        assert_eq!(factory.subscriptions(), 2);

        wait_until(|| factory.closed() == 1).await;
        assert_eq!(orch.active_monitors(), vec![dir.path().to_path_buf()]);

        orch.drain().await;
        assert_eq!(factory.closed(), 2);
        assert!(orch.active_monitors().is_empty());
    }

    #[tokio::test]
    async fn cancellation_drains_monitors() {
        let dir = tempdir().unwrap();
        let mount = dir.path().to_str().unwrap();
        let enumerator = ScriptedEnumerator::new(usb_records("sdb", &[mount]));
        let factory = FakeFactory::default();
        let mut orch = orchestrator(enumerator, &factory, RecordingSink::new());

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let registry = orch.registry().clone();
        let handle = tokio::spawn(async move {
            orch.run_until(cancel).await;
            orch
        });

        wait_until(|| registry.len() == 1).await;
        stopper.cancel();

        let orch = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("orchestrator did not stop")
            .unwrap();
        assert!(orch.active_monitors().is_empty());
        assert_eq!(factory.closed(), 1);
    }
}
