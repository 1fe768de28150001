//! Refresh cycle statistics
//!
//! Counts how attempts ended, how long the provider took and where the
//! backoff currently stands. Superseded attempts never count as completed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of the refresh statistics for one tracker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshMetrics {
    /// Name of the provider
    pub provider_name: String,
    /// Attempts that produced a price or a failure
    pub completed_attempts: u64,
    /// Completed attempts that failed
    pub failed_attempts: u64,
    /// Attempts cancelled before they resolved
    pub superseded_attempts: u64,
    /// Failures since the last successful attempt
    pub consecutive_failures: u32,
    /// Delay until the next scheduled attempt, in milliseconds
    pub next_delay_ms: Option<u64>,
    /// Latency of the most recent completed attempt, in milliseconds
    pub last_latency_ms: Option<u64>,
    /// Running mean latency of successful attempts, in milliseconds
    pub mean_success_latency_ms: Option<f64>,
    /// When the last price was fetched
    pub last_success: Option<DateTime<Utc>>,
}

impl RefreshMetrics {
    fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            completed_attempts: 0,
            failed_attempts: 0,
            superseded_attempts: 0,
            consecutive_failures: 0,
            next_delay_ms: None,
            last_latency_ms: None,
            mean_success_latency_ms: None,
            last_success: None,
        }
    }

    /// Share of completed attempts that succeeded; 1.0 before any completed
    pub fn success_rate(&self) -> f64 {
        if self.completed_attempts == 0 {
            return 1.0;
        }
        (self.completed_attempts - self.failed_attempts) as f64 / self.completed_attempts as f64
    }
}

/// Collects refresh statistics, shared between the session task and handles
pub struct MetricsCollector {
    inner: RwLock<RefreshMetrics>,
}

impl MetricsCollector {
    pub fn new(provider_name: &str) -> Self {
        Self {
            inner: RwLock::new(RefreshMetrics::new(provider_name)),
        }
    }

    /// Records an attempt that resolved with a price or a failure
    pub async fn record_attempt(&self, latency: Duration, success: bool) {
        let latency_ms = latency.as_millis() as u64;
        let mut m = self.inner.write().await;

        m.completed_attempts += 1;
        m.last_latency_ms = Some(latency_ms);

        if success {
            let successes = (m.completed_attempts - m.failed_attempts) as f64;
            let previous = m.mean_success_latency_ms.unwrap_or(0.0);
            m.mean_success_latency_ms =
                Some(previous + (latency_ms as f64 - previous) / successes);
            m.consecutive_failures = 0;
            m.last_success = Some(Utc::now());
        } else {
            m.failed_attempts += 1;
            m.consecutive_failures = m.consecutive_failures.saturating_add(1);
        }
    }

    /// Records an attempt cancelled before it resolved
    pub async fn record_superseded(&self) {
        self.inner.write().await.superseded_attempts += 1;
    }

    /// Records the delay the controller settled on after an attempt
    pub async fn record_next_delay(&self, delay: Duration) {
        self.inner.write().await.next_delay_ms = Some(delay.as_millis() as u64);
    }

    pub async fn snapshot(&self) -> RefreshMetrics {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_then_recovery() {
        let collector = MetricsCollector::new("etherscan");

        collector.record_attempt(Duration::from_millis(150), false).await;
        collector.record_attempt(Duration::from_millis(90), false).await;
        collector.record_next_delay(Duration::from_secs(60)).await;

        let m = collector.snapshot().await;
        assert_eq!(m.consecutive_failures, 2);
        assert_eq!(m.next_delay_ms, Some(60_000));
        assert_eq!(m.mean_success_latency_ms, None);
        assert_eq!(m.success_rate(), 0.0);

        collector.record_attempt(Duration::from_millis(100), true).await;
        collector.record_attempt(Duration::from_millis(200), true).await;
        collector.record_next_delay(Duration::from_secs(15)).await;

        let m = collector.snapshot().await;
        assert_eq!(m.provider_name, "etherscan");
        assert_eq!(m.completed_attempts, 4);
        assert_eq!(m.failed_attempts, 2);
        assert_eq!(m.consecutive_failures, 0);
        assert_eq!(m.last_latency_ms, Some(200));
        assert_eq!(m.mean_success_latency_ms, Some(150.0));
        assert_eq!(m.next_delay_ms, Some(15_000));
        assert!(m.last_success.is_some());
        assert_eq!(m.success_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_superseded_is_not_completed() {
        let collector = MetricsCollector::new("mock");
        collector.record_superseded().await;

        let m = collector.snapshot().await;
        assert_eq!(m.completed_attempts, 0);
        assert_eq!(m.superseded_attempts, 1);
        assert_eq!(m.success_rate(), 1.0);
    }
}
