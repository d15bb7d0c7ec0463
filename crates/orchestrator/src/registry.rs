#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Claim {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    next_generation: u64,
    active: HashMap<PathBuf, Claim>,
}

impl Inner {
    fn insert(&mut self, path: &Path, cancel: CancellationToken) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(previous) = self
            .active
            .insert(path.to_path_buf(), Claim { generation, cancel })
        {
            previous.cancel.cancel();
        }
        generation
    }
}

/// Mount points that currently have a live monitor.
///
/// At most one monitor exists per path. A claim is held by a
/// [`RegistryLease`], which gives the path back when dropped. Each claim
/// carries the cancellation token of the monitor that owns it.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lease(&self, path: &Path, generation: u64) -> RegistryLease {
        RegistryLease {
            registry: self.clone(),
            path: path.to_path_buf(),
            generation,
        }
    }

    /// Claim `path` for a new monitor. Returns `None` if it is already claimed.
    pub fn claim(&self, path: &Path, cancel: CancellationToken) -> Option<RegistryLease> {
        let mut inner = self.lock();
        if inner.active.contains_key(path) {
            return None;
        }
        let generation = inner.insert(path, cancel);
        Some(self.lease(path, generation))
    }

    /// Claim `path` unconditionally. A monitor already holding it is
    /// cancelled, and its lease no longer releases the path.
    pub fn replace(&self, path: &Path, cancel: CancellationToken) -> RegistryLease {
        let generation = self.lock().insert(path, cancel);
        self.lease(path, generation)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().active.contains_key(path)
    }

    /// Claimed paths in sorted order.
    pub fn active(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.lock().active.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, path: &Path, generation: u64) {
        let mut inner = self.lock();
        // A newer claim on the same path must survive an old lease.
        if inner
            .active
            .get(path)
            .is_some_and(|claim| claim.generation == generation)
        {
            inner.active.remove(path);
        }
    }
}

/// Exclusive claim on a mount point.
#[derive(Debug)]
pub struct RegistryLease {
    registry: MonitorRegistry,
    path: PathBuf,
    generation: u64,
}

impl RegistryLease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLease {
    fn drop(&mut self) {
        self.registry.release(&self.path, self.generation);
    }
}
