//! Minimal `/metrics` text exporter (spec SPEC_FULL.md §6). The exposition
//! format is explicitly non-contractual, so this counts requests and webhook
//! deliveries with plain atomics rather than pulling in a `metrics`/
//! `prometheus` crate for a handful of counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    requests_failed_total: AtomicU64,
    webhook_deliveries_total: AtomicU64,
    webhook_deliveries_failed_total: AtomicU64,
}

impl Metrics {
    pub fn record_request(&self, failed: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.requests_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_webhook_delivery(&self, failed: bool) {
        self.webhook_deliveries_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.webhook_deliveries_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn render(&self) -> String {
        format!(
            "# TYPE tessera_requests_total counter\n\
             tessera_requests_total {}\n\
             # TYPE tessera_requests_failed_total counter\n\
             tessera_requests_failed_total {}\n\
             # TYPE tessera_webhook_deliveries_total counter\n\
             tessera_webhook_deliveries_total {}\n\
             # TYPE tessera_webhook_deliveries_failed_total counter\n\
             tessera_webhook_deliveries_failed_total {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.requests_failed_total.load(Ordering::Relaxed),
            self.webhook_deliveries_total.load(Ordering::Relaxed),
            self.webhook_deliveries_failed_total.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_reflects_recorded_counts() {
        let metrics = Metrics::default();
        metrics.record_request(false);
        metrics.record_request(true);
        let rendered = metrics.render();
        assert!(rendered.contains("tessera_requests_total 2"));
        assert!(rendered.contains("tessera_requests_failed_total 1"));
    }
}
