use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Cpu {
    /// Whether CPU utilization is sampled and logged at all.
    pub enabled: bool,

    /// Sampling period. **Measured in milliseconds**.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub interval: Duration,

    /// Number of samples kept in the rolling window. Must be at least 1.
    pub window: usize,
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
            window: 5,
        }
    }
}
