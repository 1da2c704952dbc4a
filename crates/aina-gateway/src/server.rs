// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use aina_config::model::{GatewayConfig, WebhookConfig};
use aina_core::AinaError;
use aina_engine::{Engine, Ingestor};
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{TokenTable, auth_middleware};
use crate::{handlers, sse, webhooks, ws};

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Engine,
    /// Queue feeding the webhook worker.
    pub ingestor: Ingestor,
    pub webhook: WebhookConfig,
    /// Secret signing payment gateway notifications. `None` disables the check.
    pub billing_secret: Option<String>,
    pub health: HealthState,
    /// Fired on shutdown; ends open realtime streams.
    pub shutdown: CancellationToken,
}

/// Build the full router.
///
/// - `/health`, `/metrics` and `/webhooks/*` are public
/// - `/v1/*` requires a bearer token (or `access_token` query parameter)
pub fn router(state: GatewayState, tokens: TokenTable) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route("/webhooks/payments", post(webhooks::payment_notification))
        .route(
            "/webhooks/{platform}",
            get(webhooks::verify_subscription).post(webhooks::receive_webhook),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_message))
        .route("/v1/conversations", get(handlers::list_conversations))
        .route("/v1/conversations/{id}", delete(handlers::delete_conversation))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::conversation_messages),
        )
        .route(
            "/v1/conversations/{id}/session",
            get(handlers::session_state),
        )
        .route(
            "/v1/conversations/{id}/assign",
            post(handlers::assign_conversation),
        )
        .route("/v1/ledger", get(handlers::ledger_entries))
        .route("/v1/ledger/balance", get(handlers::ledger_balance))
        .route("/v1/ledger/summary", get(handlers::ledger_summary))
        .route(
            "/v1/automations",
            get(handlers::list_automations).post(handlers::create_automation),
        )
        .route(
            "/v1/automations/{id}",
            patch(handlers::update_automation).delete(handlers::delete_automation),
        )
        .route(
            "/v1/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route(
            "/v1/campaigns/{id}",
            get(handlers::get_campaign).delete(handlers::delete_campaign),
        )
        .route(
            "/v1/campaigns/{id}/launch",
            post(handlers::launch_campaign),
        )
        .route("/v1/billing/packs", get(handlers::credit_packs))
        .route(
            "/v1/billing/orders",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route(
            "/v1/admin/tenants",
            get(handlers::admin_list_tenants).post(handlers::admin_create_tenant),
        )
        .route(
            "/v1/admin/tenants/{id}/status",
            put(handlers::admin_set_status),
        )
        .route(
            "/v1/admin/tenants/{id}/credentials",
            put(handlers::admin_set_credentials),
        )
        .route(
            "/v1/admin/tenants/{id}/balance",
            post(handlers::admin_adjust_balance),
        )
        .route(
            "/v1/admin/tenants/{id}/ledger/verify",
            get(handlers::admin_verify_ledger),
        )
        .route(
            "/v1/admin/messages/{id}/reconcile",
            post(handlers::admin_reconcile_message),
        )
        .route("/v1/ws", get(ws::ws_handler))
        .route("/v1/events", get(sse::events_handler))
        .route_layer(axum_middleware::from_fn_with_state(tokens, auth_middleware))
        .with_state(state);

    Router::new().merge(public_routes).merge(api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Serve the gateway until `state.shutdown` fires, then drain in-flight
/// requests.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    tokens: TokenTable,
) -> Result<(), AinaError> {
    if tokens.is_empty() {
        tracing::warn!("no [[gateway.tokens]] configured; every /v1 request will be rejected");
    }
    let shutdown = state.shutdown.clone();
    let app = router(state, tokens);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AinaError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AinaError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_state_render_is_optional() {
        let state = HealthState::new(None);
        assert!(state.prometheus_render.is_none());
        let state = HealthState::new(Some(Arc::new(|| "aina_up 1".to_string())));
        let render = state.prometheus_render.unwrap();
        assert_eq!(render(), "aina_up 1");
    }
}
