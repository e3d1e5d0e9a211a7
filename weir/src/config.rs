//! Configuration of the throttling controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_smoothing_folding_time() -> f64 {
    10.0
}

fn default_min_per_client_rate() -> f64 {
    1.0
}

fn default_quota_scan_limit() -> usize {
    1_000_000
}

fn default_quota_poll_interval_milliseconds() -> u64 {
    5_000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
/// Configuration of the throttling controller.
pub struct Config {
    /// Folding time, in seconds, of every smoother in the controller: cost
    /// throughput, transaction arrivals and the published per-client rate.
    #[serde(default = "default_smoothing_folding_time")]
    pub smoothing_folding_time: f64,
    /// Floor applied to every published per-client TPS limit.
    #[serde(default = "default_min_per_client_rate")]
    pub min_per_client_rate: f64,
    /// Page size of the quota range scan.
    #[serde(default = "default_quota_scan_limit")]
    pub quota_scan_limit: usize,
    /// The period on which the quota watcher re-reads the durable quota
    /// table.
    #[serde(default = "default_quota_poll_interval_milliseconds")]
    pub quota_poll_interval_milliseconds: u64,
}

impl Config {
    /// The quota poll period as a [`Duration`].
    #[must_use]
    pub fn quota_poll_interval(&self) -> Duration {
        Duration::from_millis(self.quota_poll_interval_milliseconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smoothing_folding_time: default_smoothing_folding_time(),
            min_per_client_rate: default_min_per_client_rate(),
            quota_scan_limit: default_quota_scan_limit(),
            quota_poll_interval_milliseconds: default_quota_poll_interval_milliseconds(),
        }
    }
}
