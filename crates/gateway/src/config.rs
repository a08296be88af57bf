//! Gateway runtime configuration

use std::time::Duration;

/// Per-wrapper runtime knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Deadline applied to every REST call
    pub request_timeout: Duration,
    /// First delay before resubscribing a dropped feed
    pub reconnect_backoff_initial: Duration,
    /// Upper bound of the doubling reconnect delay
    pub reconnect_backoff_max: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            reconnect_backoff_initial: Duration::from_millis(250),
            reconnect_backoff_max: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_backoff_initial = initial;
        self.reconnect_backoff_max = max;
        self
    }

    /// Delay before reconnect attempt `attempt` (0-based), without jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.reconnect_backoff_initial
            .saturating_mul(factor)
            .min(self.reconnect_backoff_max)
    }
}
