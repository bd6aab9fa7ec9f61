use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initializes the Prometheus recorder and returns the render handle.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    METRICS.get_or_init(Metrics::new);
    Some(handle)
}

/// Metrics collector for the payments engine.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_ledger_entry(&self, kind: &str, flow: &str) {
        counter!("payments_ledger_entries_total", "kind" => kind.to_string(), "flow" => flow.to_string()).increment(1);
    }

    pub fn record_ledger_reversal(&self, kind: &str) {
        counter!("payments_ledger_reversals_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_webhook_received(&self, event: &str) {
        counter!("payments_webhooks_received_total", "event" => event.to_string()).increment(1);
    }

    pub fn record_webhook_rejected(&self, reason: &str) {
        counter!("payments_webhooks_rejected_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn record_transfer_initiated(&self) {
        counter!("payments_transfers_initiated_total").increment(1);
    }

    pub fn record_transfer_compensated(&self) {
        counter!("payments_transfers_compensated_total").increment(1);
    }

    pub fn record_refund_processed(&self, refund_type: &str) {
        counter!("payments_refunds_processed_total", "type" => refund_type.to_string()).increment(1);
    }

    pub fn record_settlement_released(&self) {
        counter!("payments_settlements_released_total").increment(1);
    }

    pub fn record_provider_call(&self, operation: &str, duration_ms: f64, success: bool) {
        counter!("payments_provider_calls_total", "operation" => operation.to_string(), "success" => success.to_string()).increment(1);
        histogram!("payments_provider_call_duration_ms", "operation" => operation.to_string()).record(duration_ms);
    }

    pub fn set_pending_transfers(&self, count: i64) {
        gauge!("payments_pending_transfers").set(count as f64);
    }
}
