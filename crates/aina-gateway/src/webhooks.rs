// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider and payment gateway webhooks.
//!
//! Provider deliveries are acknowledged immediately and handed to the ingest
//! worker; Meta retries anything that is not a fast 200, so parsing and
//! storage never run on the request path.

use std::str::FromStr;

use aina_core::Platform;
use aina_engine::PaymentNotification;
use aina_provider::{SIGNATURE_HEADER, verify_signature};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Header carrying the payment gateway's `sha256=<hex>` body signature.
pub const PAYMENT_SIGNATURE_HEADER: &str = "x-payment-signature";

/// Meta subscription handshake parameters.
#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhooks/{platform} -- echo `hub.challenge` when the token matches.
pub async fn verify_subscription(
    State(state): State<GatewayState>,
    Path(platform): Path<String>,
    Query(query): Query<HandshakeQuery>,
) -> Response {
    let Ok(platform) = Platform::from_str(&platform) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let expected = state.webhook.verify_token.as_deref();
    let accepted = query.mode.as_deref() == Some("subscribe")
        && expected.is_some()
        && query.verify_token.as_deref() == expected;
    match (accepted, query.challenge) {
        (true, Some(challenge)) => {
            info!(platform = %platform, "webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!(platform = %platform, mode = ?query.mode, "webhook handshake rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhooks/{platform} -- acknowledge and enqueue.
///
/// Always 200 for a known platform, including when the signature is bad or
/// the queue is full; those payloads are logged and dropped.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Ok(platform) = Platform::from_str(&platform) else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(secret) = state.webhook.app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!(
                platform = %platform,
                bytes = body.len(),
                signed = !signature.is_empty(),
                "webhook signature mismatch; payload dropped"
            );
            return StatusCode::OK;
        }
    }
    if state.ingestor.enqueue(platform, body.to_vec()) {
        debug!(platform = %platform, bytes = body.len(), "webhook payload queued");
    }
    StatusCode::OK
}

/// POST /webhooks/payments -- payment gateway order confirmation.
///
/// 503 when no billing secret is configured, 401 on a bad signature.
pub async fn payment_notification(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Unsigned notifications would let anyone confirm their own orders.
    let Some(secret) = state.billing_secret.as_deref() else {
        error!("billing.webhook_secret is not configured -- rejecting payment notification");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let signature = headers
        .get(PAYMENT_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(secret, &body, signature) {
        warn!(bytes = body.len(), "payment notification signature mismatch");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let notification: PaymentNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "malformed payment notification");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    match state.engine.billing.handle_notification(notification).await {
        Ok(entry) => Json(serde_json::json!({
            "status": "processed",
            "entry_id": entry.map(|e| e.id),
        }))
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
