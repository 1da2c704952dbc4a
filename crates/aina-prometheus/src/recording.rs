// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Aina metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("aina_sends_total", "Outbound sends by final outcome");
    describe_counter!("aina_refunds_total", "Charges compensated after failed dispatch");
    describe_counter!("aina_webhook_events_total", "Webhook events received, by kind");
    describe_counter!(
        "aina_webhook_duplicates_total",
        "Re-delivered webhook messages skipped"
    );
    describe_gauge!("aina_ingest_queue_depth", "Webhook payloads waiting for the worker");
    describe_histogram!(
        "aina_dispatch_latency_seconds",
        "Provider dispatch latency including retries"
    );
}

/// Record the outcome of one send: `sent`, `failed`, `held`, or `rejected`.
pub fn record_send(platform: &str, outcome: &'static str) {
    metrics::counter!(
        "aina_sends_total",
        "platform" => platform.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a refund of a message charge.
pub fn record_refund() {
    metrics::counter!("aina_refunds_total").increment(1);
}

/// Record a parsed webhook event.
pub fn record_webhook_event(platform: &str, kind: &'static str) {
    metrics::counter!(
        "aina_webhook_events_total",
        "platform" => platform.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a duplicate webhook delivery.
pub fn record_duplicate_delivery(platform: &str) {
    metrics::counter!("aina_webhook_duplicates_total", "platform" => platform.to_string())
        .increment(1);
}

/// Set the ingest queue depth.
pub fn set_ingest_queue_depth(depth: usize) {
    metrics::gauge!("aina_ingest_queue_depth").set(depth as f64);
}

/// Record dispatch latency.
pub fn record_dispatch_latency(platform: &str, seconds: f64) {
    metrics::histogram!("aina_dispatch_latency_seconds", "platform" => platform.to_string())
        .record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_send("whatsapp", "sent");
            record_send("whatsapp", "sent");
            record_send("whatsapp", "failed");
            record_refund();
            record_webhook_event("messenger", "inbound_message");
        });
        let rendered = handle.render();
        let sent = rendered
            .lines()
            .find(|l| l.starts_with("aina_sends_total{") && l.contains(r#"outcome="sent""#))
            .unwrap_or_else(|| panic!("no sent counter in:\n{rendered}"));
        assert!(sent.ends_with(" 2"), "{sent}");
        assert!(rendered.contains("aina_refunds_total 1"), "{rendered}");
        assert!(rendered.contains("aina_webhook_events_total"), "{rendered}");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_dispatch_latency("whatsapp", 0.25);
        set_ingest_queue_depth(3);
    }
}
