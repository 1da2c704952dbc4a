// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket push of a tenant's realtime events.
//!
//! Server -> Client (JSON, one event per text frame):
//! ```json
//! {"event_id": "...", "tenant_id": "acme", "timestamp": "...",
//!  "type": "message.created", "data": {"message": {...}}}
//! ```
//!
//! Client frames other than close are ignored. A `resync` event means the
//! client fell behind and must re-fetch state over REST.

use aina_bus::Subscription;
use aina_core::AuthContext;
use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::server::GatewayState;

/// WebSocket upgrade handler. The caller is already authenticated.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> Response {
    let subscription = state.engine.bus.subscribe(&ctx.tenant_id);
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, subscription, shutdown))
}

/// Forward bus events to the socket until the client leaves, the bus closes
/// or the server shuts down.
async fn handle_socket(socket: WebSocket, mut subscription: Subscription, shutdown: CancellationToken) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let tenant_id = subscription.tenant_id().clone();
    tracing::debug!(tenant_id = %tenant_id, "realtime socket opened");

    let sender_task = tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                () = shutdown.cancelled() => break,
                next = subscription.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize realtime event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    sender_task.abort();
    tracing::debug!(tenant_id = %tenant_id, "realtime socket closed");
}
