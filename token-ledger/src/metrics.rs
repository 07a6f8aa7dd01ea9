//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `token_ledger_operations_total{operation}` - Accepted mutations by kind
//! - `token_ledger_rejections_total{reason}` - Rejected mutations by reason
//! - `token_ledger_notifications_total` - Notifications emitted
//! - `token_ledger_operation_duration_seconds` - Histogram of mutation latencies
//! - `token_ledger_holders` - Accounts with a nonzero balance
//!
//! Metrics live in a private [`Registry`] so several ledgers (and tests) can
//! coexist in one process.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Accepted mutations by operation
    pub operations_total: IntCounterVec,

    /// Rejected mutations by reason
    pub rejections_total: IntCounterVec,

    /// Notifications emitted
    pub notifications_total: IntCounter,

    /// Mutation latency histogram
    pub operation_duration: Histogram,

    /// Accounts holding a nonzero balance
    pub holders: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("token_ledger_operations_total", "Accepted mutations by operation"),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("token_ledger_rejections_total", "Rejected mutations by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let notifications_total = IntCounter::new(
            "token_ledger_notifications_total",
            "Total number of notifications emitted",
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "token_ledger_operation_duration_seconds",
                "Histogram of mutation latencies",
            )
            .buckets(vec![0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let holders = IntGauge::new(
            "token_ledger_holders",
            "Accounts holding a nonzero balance",
        )?;
        registry.register(Box::new(holders.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            notifications_total,
            operation_duration,
            holders,
            registry,
        })
    }

    /// Record an accepted mutation and its notification
    pub fn record_operation(&self, operation: &str, duration_seconds: f64) {
        self.operations_total.with_label_values(&[operation]).inc();
        self.notifications_total.inc();
        self.operation_duration.observe(duration_seconds);
    }

    /// Record a rejected mutation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Update holder count
    pub fn update_holders(&self, holders: usize) {
        self.holders.set(holders as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("notifications_total", &self.notifications_total.get())
            .field("holders", &self.holders.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.notifications_total.get(), 0);
        assert_eq!(metrics.holders.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_operation("transfer", 0.000_02);
        assert_eq!(first.notifications_total.get(), 1);
        assert_eq!(second.notifications_total.get(), 0);
    }

    #[test]
    fn test_record_operation_by_label() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("transfer", 0.000_02);
        metrics.record_operation("transfer", 0.000_03);
        metrics.record_operation("approve", 0.000_01);

        assert_eq!(
            metrics.operations_total.with_label_values(&["transfer"]).get(),
            2
        );
        assert_eq!(
            metrics.operations_total.with_label_values(&["approve"]).get(),
            1
        );
        assert_eq!(metrics.notifications_total.get(), 3);
    }

    #[test]
    fn test_record_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection("insufficient_balance");
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["insufficient_balance"])
                .get(),
            1
        );
    }

    #[test]
    fn test_gather_text() {
        let metrics = Metrics::new().unwrap();
        metrics.update_holders(3);
        let text = metrics.gather_text();
        assert!(text.contains("token_ledger_holders 3"));
    }
}
