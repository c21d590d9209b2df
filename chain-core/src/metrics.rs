//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `chain_transactions_accepted_total` - Transactions admitted to the pending batch
//! - `chain_transactions_rejected_total` - Submissions rejected at validation
//! - `chain_blocks_sealed_total` - Blocks appended after genesis
//! - `chain_pending_transactions` - Current pending batch length
//! - `chain_seal_batch_size` - Histogram of sealed batch sizes
//!
//! Each collector registers into its own [`Registry`], so several ledgers can
//! live in one process.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Accepted transactions
    pub transactions_accepted: IntCounter,

    /// Rejected submissions
    pub transactions_rejected: IntCounter,

    /// Sealed blocks
    pub blocks_sealed: IntCounter,

    /// Pending batch length
    pub pending: IntGauge,

    /// Sealed batch size histogram
    pub seal_batch_size: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_accepted = IntCounter::new(
            "chain_transactions_accepted_total",
            "Transactions admitted to the pending batch",
        )?;
        registry.register(Box::new(transactions_accepted.clone()))?;

        let transactions_rejected = IntCounter::new(
            "chain_transactions_rejected_total",
            "Submissions rejected at validation",
        )?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let blocks_sealed = IntCounter::new(
            "chain_blocks_sealed_total",
            "Blocks appended after genesis",
        )?;
        registry.register(Box::new(blocks_sealed.clone()))?;

        let pending = IntGauge::new(
            "chain_pending_transactions",
            "Current pending batch length",
        )?;
        registry.register(Box::new(pending.clone()))?;

        let seal_batch_size = Histogram::with_opts(
            HistogramOpts::new("chain_seal_batch_size", "Histogram of sealed batch sizes")
                .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )?;
        registry.register(Box::new(seal_batch_size.clone()))?;

        Ok(Self {
            transactions_accepted,
            transactions_rejected,
            blocks_sealed,
            pending,
            seal_batch_size,
            registry,
        })
    }

    /// Record an admitted transaction
    pub fn record_accepted(&self, pending_len: usize) {
        self.transactions_accepted.inc();
        self.pending.set(pending_len as i64);
    }

    /// Record a rejected submission
    pub fn record_rejected(&self) {
        self.transactions_rejected.inc();
    }

    /// Record a sealed block
    pub fn record_sealed(&self, batch_size: usize) {
        self.blocks_sealed.inc();
        self.seal_batch_size.observe(batch_size as f64);
        self.pending.set(0);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_accepted", &self.transactions_accepted.get())
            .field("transactions_rejected", &self.transactions_rejected.get())
            .field("blocks_sealed", &self.blocks_sealed.get())
            .field("pending", &self.pending.get())
            .finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        // Fixed, distinct metric names on a fresh registry cannot collide
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transactions_accepted.get(), 0);
        assert_eq!(metrics.blocks_sealed.get(), 0);
        assert_eq!(metrics.registry().gather().len(), 5);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_rejected();

        assert_eq!(first.transactions_rejected.get(), 1);
        assert_eq!(second.transactions_rejected.get(), 0);
    }

    #[test]
    fn test_accept_then_seal() {
        let metrics = Metrics::new().unwrap();
        metrics.record_accepted(1);
        metrics.record_accepted(2);
        assert_eq!(metrics.transactions_accepted.get(), 2);
        assert_eq!(metrics.pending.get(), 2);

        metrics.record_sealed(2);
        assert_eq!(metrics.blocks_sealed.get(), 1);
        assert_eq!(metrics.pending.get(), 0);
        assert_eq!(metrics.seal_batch_size.get_sample_count(), 1);
    }
}
