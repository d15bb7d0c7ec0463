#![forbid(unsafe_code)]

//! System CPU load sampling.

mod sampler;
mod window;

pub use sampler::CpuSampler;
pub use window::CpuWindow;

use crate::error::Error;
use procfs::{CpuTime, CurrentSI, KernelStats};

/// Cumulative jiffies spent busy and in total since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub busy: u64,
    pub total: u64,
}

impl From<&CpuTime> for CpuTicks {
    fn from(time: &CpuTime) -> Self {
        let busy = time.user
            + time.nice
            + time.system
            + time.irq.unwrap_or(0)
            + time.softirq.unwrap_or(0)
            + time.steal.unwrap_or(0);
        let idle = time.idle + time.iowait.unwrap_or(0);
        Self {
            busy,
            total: busy + idle,
        }
    }
}

/// One reading of the aggregate and per-core counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: CpuTicks,
    pub cores: Vec<CpuTicks>,
}

pub trait CpuSource: Send {
    fn read(&mut self) -> Result<CpuTimes, Error>;
}

/// Reads `/proc/stat`.
#[derive(Debug, Default)]
pub struct ProcfsCpuSource;

impl CpuSource for ProcfsCpuSource {
    fn read(&mut self) -> Result<CpuTimes, Error> {
        let stats = KernelStats::current()?;
        Ok(CpuTimes {
            total: CpuTicks::from(&stats.total),
            cores: stats.cpu_time.iter().map(CpuTicks::from).collect(),
        })
    }
}

/// Busy share between two readings, in percent.
pub fn utilization(prev: CpuTicks, cur: CpuTicks) -> f64 {
    let total = cur.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let busy = cur.busy.saturating_sub(prev.busy).min(total);
    busy as f64 * 100.0 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_busy_share_of_elapsed() {
        let prev = CpuTicks { busy: 100, total: 400 };
        let cur = CpuTicks { busy: 150, total: 600 };
        assert_eq!(utilization(prev, cur), 25.0);
    }

    #[test]
    fn no_elapsed_time_is_idle() {
        let ticks = CpuTicks { busy: 10, total: 20 };
        assert_eq!(utilization(ticks, ticks), 0.0);
    }

    #[test]
    fn counter_reset_does_not_underflow() {
        let prev = CpuTicks { busy: 500, total: 1000 };
        let cur = CpuTicks { busy: 10, total: 20 };
        assert_eq!(utilization(prev, cur), 0.0);
    }

    #[test]
    fn procfs_reading_has_cores() {
        if !std::path::Path::new("/proc/stat").exists() {
            return;
        }
        let times = ProcfsCpuSource.read().unwrap();
        assert!(!times.cores.is_empty());
        assert!(times.total.total >= times.total.busy);
    }
}
