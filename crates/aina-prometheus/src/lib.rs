// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exporter for Aina's `metrics` facade calls.
//!
//! The engine records through [`recording`]; this adapter installs the global
//! recorder and renders the text exposition served at `/metrics`.

pub mod recording;

use aina_core::{AdapterType, AinaError, HealthStatus, PluginAdapter};
use async_trait::async_trait;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub use recording::{
    record_dispatch_latency, record_duplicate_delivery, record_refund, record_send,
    record_webhook_event, register_metrics, set_ingest_queue_depth,
};

/// Latency buckets in seconds. Meta's APIs usually answer within a second;
/// the upper buckets catch retries and timeouts.
const DISPATCH_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the process-wide recorder. A second install fails.
    pub fn new() -> Result<Self, AinaError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("aina_dispatch_latency_seconds".to_string()),
                DISPATCH_BUCKETS,
            )
            .and_then(|builder| builder.install_recorder())
            .map_err(|e| AinaError::Internal(format!("prometheus recorder: {e}")))?;
        register_metrics();
        tracing::info!("prometheus recorder installed");
        Ok(Self { handle })
    }

    /// Text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, AinaError> {
        Ok(HealthStatus::Healthy)
    }
}
