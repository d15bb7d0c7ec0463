#![forbid(unsafe_code)]

use crate::audit::CpuEntry;
use std::collections::VecDeque;

/// The most recent CPU samples, oldest first.
#[derive(Debug, Clone)]
pub struct CpuWindow {
    capacity: usize,
    samples: VecDeque<CpuEntry>,
}

impl CpuWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: CpuEntry) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the windowed averages.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|entry| entry.average).sum();
        Some(sum / self.samples.len() as f64)
    }

    /// Up to `n` most recent samples, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &CpuEntry> {
        self.samples.iter().skip(self.samples.len().saturating_sub(n))
    }
}
