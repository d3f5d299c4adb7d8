use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static PAYMENT_ORDERS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static WEBHOOK_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let orders_counter = IntCounterVec::new(
        Opts::new(
            "payment_orders_total",
            "Total payment orders created, by currency",
        ),
        &["currency"],
    )
    .expect("Failed to create payment_orders_total metric");

    let webhook_counter = IntCounterVec::new(
        Opts::new(
            "payment_webhook_events_total",
            "Total webhook events received, by event type and outcome",
        ),
        &["event", "outcome"],
    )
    .expect("Failed to create payment_webhook_events_total metric");

    registry
        .register(Box::new(orders_counter.clone()))
        .expect("Failed to register payment_orders_total");
    registry
        .register(Box::new(webhook_counter.clone()))
        .expect("Failed to register payment_webhook_events_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    PAYMENT_ORDERS_TOTAL
        .set(orders_counter)
        .expect("Failed to set payment_orders_total");
    WEBHOOK_EVENTS_TOTAL
        .set(webhook_counter)
        .expect("Failed to set payment_webhook_events_total");
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record a created payment order.
pub fn record_order(currency: &str) {
    if let Some(counter) = PAYMENT_ORDERS_TOTAL.get() {
        counter.with_label_values(&[currency]).inc();
    }
}

/// Record a webhook delivery and how the reconciler resolved it.
pub fn record_webhook_event(event: &str, outcome: &str) {
    if let Some(counter) = WEBHOOK_EVENTS_TOTAL.get() {
        counter.with_label_values(&[event, outcome]).inc();
    }
}
