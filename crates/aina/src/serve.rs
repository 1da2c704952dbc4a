// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aina serve` command implementation.
//!
//! Opens SQLite storage, registers the WhatsApp and Messenger providers,
//! starts the webhook ingest worker and serves the gateway until SIGINT or
//! SIGTERM. On shutdown the gateway drains in-flight requests first, then the
//! ingest worker finishes the payloads it already acknowledged.

use std::sync::Arc;
use std::time::Duration;

use aina_config::model::AinaConfig;
use aina_core::{AinaError, Clock, HealthStatus, PluginAdapter, SystemClock};
use aina_engine::{Engine, Ingestor, ProviderRegistry, shutdown};
use aina_gateway::{GatewayState, HealthState, TokenTable};
use aina_provider::{MessengerProvider, WhatsAppCloudProvider};
use aina_storage::SqliteStorage;
use tracing::{debug, error, info, warn};

/// How long the ingest worker may spend on queued payloads after shutdown.
const INGEST_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Register both Meta providers. Per-tenant credentials are supplied per send,
/// so a provider only fails to build on a malformed API base URL.
fn build_providers(config: &AinaConfig) -> Result<ProviderRegistry, AinaError> {
    let whatsapp = WhatsAppCloudProvider::new(&config.whatsapp)?;
    let messenger = MessengerProvider::new(&config.messenger)?;
    Ok(ProviderRegistry::new()
        .with(Arc::new(whatsapp))
        .with(Arc::new(messenger)))
}

/// Runs the `aina serve` command.
pub async fn run_serve(config: AinaConfig) -> Result<(), AinaError> {
    info!("starting aina serve");

    let storage = SqliteStorage::new(config.storage.clone());
    let db = storage.initialize().await?;
    match storage.health_check().await? {
        HealthStatus::Healthy => info!(adapter = %storage.label(), "storage ready"),
        other => warn!(adapter = %storage.label(), status = ?other, "storage degraded"),
    }

    let providers = build_providers(&config)?;

    #[cfg(feature = "prometheus")]
    let prometheus_adapter = if config.prometheus.enabled {
        match aina_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(Arc::new(adapter))
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    // Render function for the gateway /metrics endpoint.
    #[cfg(feature = "prometheus")]
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus_adapter.map(|adapter| {
            Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });
    #[cfg(not(feature = "prometheus"))]
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> = None;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Engine::new(&config, db, providers, clock);
    let interrupted = engine.campaigns.recover_interrupted().await?;
    if interrupted > 0 {
        warn!(interrupted, "campaigns left sending by a previous run were marked failed");
    }

    let cancel = shutdown::install_signal_handler();
    let (ingestor, worker) = Ingestor::spawn(
        engine.ingest.clone(),
        config.server.ingest_queue_capacity,
        cancel.clone(),
    );

    let state = GatewayState {
        engine: engine.clone(),
        ingestor,
        webhook: config.webhook.clone(),
        billing_secret: config.billing.webhook_secret.clone(),
        health: HealthState::new(prometheus_render),
        shutdown: cancel.clone(),
    };
    let tokens = TokenTable::from_config(&config.gateway.tokens);
    info!(
        host = config.gateway.host.as_str(),
        port = config.gateway.port,
        tokens = config.gateway.tokens.len(),
        signed_webhooks = config.webhook.app_secret.is_some(),
        "gateway configured"
    );

    if config.billing.webhook_secret.is_none() {
        warn!("billing.webhook_secret is unset; payment notifications will be rejected");
    }

    let served = aina_gateway::start_server(&config.gateway, state, tokens).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway failed");
        cancel.cancel();
    }

    shutdown::drain_ingest(worker, INGEST_DRAIN_TIMEOUT).await;
    engine.send.providers().shutdown().await;
    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }

    served?;
    info!("aina serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aina={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_core::Platform;

    #[test]
    fn default_config_registers_both_platforms() {
        let registry = build_providers(&AinaConfig::default()).unwrap();
        let mut platforms: Vec<_> = registry.platforms().collect();
        platforms.sort_by_key(|p| p.to_string());
        assert_eq!(platforms, vec![Platform::Messenger, Platform::WhatsApp]);
        assert!(
            registry
                .capabilities(Platform::WhatsApp)
                .unwrap()
                .session_window
                .is_some()
        );
    }
}
