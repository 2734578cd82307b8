use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub struct ClientMetrics {
    pub registry: Registry,
    pub poll_cycles_total: IntCounterVec,
    pub page_fetches_total: IntCounterVec,
    pub status_updates_applied_total: IntCounter,
}

static METRICS: OnceLock<ClientMetrics> = OnceLock::new();

/// Client-side counters, registered on first use.
pub fn metrics() -> &'static ClientMetrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let poll_cycles_total = IntCounterVec::new(
            Opts::new(
                "library_poll_cycles_total",
                "Status poll cycles by outcome (success, failure, discarded)",
            ),
            &["outcome"],
        )
        .expect("metric can be created");

        let page_fetches_total = IntCounterVec::new(
            Opts::new("library_page_fetches_total", "Library page fetches by outcome"),
            &["outcome"],
        )
        .expect("metric can be created");

        let status_updates_applied_total = IntCounter::new(
            "library_status_updates_applied_total",
            "Documents changed by merged status updates",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(poll_cycles_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(page_fetches_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(status_updates_applied_total.clone()))
            .expect("collector can be registered");

        ClientMetrics {
            registry,
            poll_cycles_total,
            page_fetches_total,
            status_updates_applied_total,
        }
    })
}

pub fn record_poll_cycle(outcome: &str) {
    metrics()
        .poll_cycles_total
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_page_fetch(outcome: &str) {
    metrics()
        .page_fetches_total
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_status_updates_applied(count: usize) {
    metrics().status_updates_applied_total.inc_by(count as u64);
}

/// Render all client metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = metrics().registry.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
