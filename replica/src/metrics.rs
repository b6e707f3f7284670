//! Prometheus metrics for a replica.
//!
//! [`ReplicaMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::Stage;

pub struct ReplicaMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Writes that passed validation (whether or not the ledger accepted them).
    pub writes_admitted: IntCounter,
    /// Reads answered, including public key lookups.
    pub reads_served: IntCounter,
    pub nonces_issued: IntCounter,
    /// Transactions installed by write-back requests.
    pub write_backs_applied: IntCounter,
    /// Requests refused by the validation pipeline, by stage.
    pub requests_rejected: IntCounterVec,
    /// Admitted requests the ledger refused, by error.
    pub operations_failed: IntCounterVec,
    pub snapshot_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub account_count: IntGauge,
    pub ledger_timestamp: IntGauge,
    pub outstanding_nonces: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent holding the ledger write lock, in milliseconds.
    pub write_time_ms: Histogram,
}

impl ReplicaMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let writes_admitted = register_int_counter_with_registry!(
            Opts::new("bftb_writes_admitted_total", "Writes that passed validation"),
            registry
        )
        .expect("failed to register writes_admitted counter");

        let reads_served = register_int_counter_with_registry!(
            Opts::new("bftb_reads_served_total", "Read requests answered"),
            registry
        )
        .expect("failed to register reads_served counter");

        let nonces_issued = register_int_counter_with_registry!(
            Opts::new("bftb_nonces_issued_total", "Nonces handed out"),
            registry
        )
        .expect("failed to register nonces_issued counter");

        let write_backs_applied = register_int_counter_with_registry!(
            Opts::new(
                "bftb_write_backs_applied_total",
                "Transactions installed by write-back"
            ),
            registry
        )
        .expect("failed to register write_backs_applied counter");

        let requests_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "bftb_requests_rejected_total",
                "Requests refused by the validation pipeline"
            ),
            &["stage"],
            registry
        )
        .expect("failed to register requests_rejected counter");

        let operations_failed = register_int_counter_vec_with_registry!(
            Opts::new(
                "bftb_operations_failed_total",
                "Validated requests refused by the ledger"
            ),
            &["error"],
            registry
        )
        .expect("failed to register operations_failed counter");

        let snapshot_failures = register_int_counter_with_registry!(
            Opts::new("bftb_snapshot_failures_total", "Failed snapshot writes"),
            registry
        )
        .expect("failed to register snapshot_failures counter");

        let account_count = register_int_gauge_with_registry!(
            Opts::new("bftb_account_count", "Accounts in the ledger"),
            registry
        )
        .expect("failed to register account_count gauge");

        let ledger_timestamp = register_int_gauge_with_registry!(
            Opts::new("bftb_ledger_timestamp", "Current ledger write timestamp"),
            registry
        )
        .expect("failed to register ledger_timestamp gauge");

        let outstanding_nonces = register_int_gauge_with_registry!(
            Opts::new("bftb_outstanding_nonces", "Issued nonces not yet used"),
            registry
        )
        .expect("failed to register outstanding_nonces gauge");

        let write_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "bftb_write_time_ms",
                "Time holding the ledger write lock in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.05, 2.0, 15).expect("valid bucket layout")),
            registry
        )
        .expect("failed to register write_time_ms histogram");

        Self {
            registry,
            writes_admitted,
            reads_served,
            nonces_issued,
            write_backs_applied,
            requests_rejected,
            operations_failed,
            snapshot_failures,
            account_count,
            ledger_timestamp,
            outstanding_nonces,
            write_time_ms,
        }
    }

    pub fn record_rejection(&self, stage: Stage) {
        self.requests_rejected
            .with_label_values(&[stage.as_str()])
            .inc();
    }

    pub fn record_failure(&self, error: &str) {
        self.operations_failed.with_label_values(&[error]).inc();
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for ReplicaMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_metrics() {
        let metrics = ReplicaMetrics::new();
        metrics.writes_admitted.inc();
        metrics.record_rejection(Stage::Nonce);
        metrics.ledger_timestamp.set(7);

        let text = metrics.encode();
        assert!(text.contains("bftb_writes_admitted_total 1"));
        assert!(text.contains("bftb_requests_rejected_total{stage=\"nonce\"} 1"));
        assert!(text.contains("bftb_ledger_timestamp 7"));
    }
}
