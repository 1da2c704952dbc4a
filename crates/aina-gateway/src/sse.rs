// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events stream of a tenant's realtime events.
//!
//! SSE event format:
//! ```text
//! event: message.status_changed
//! id: 5b1c...
//! data: {"event_id": "5b1c...", "type": "message.status_changed", "data": {...}, ...}
//! ```

use std::convert::Infallible;

use aina_bus::EventEnvelope;
use aina_core::AuthContext;
use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};

use crate::server::GatewayState;

/// GET /v1/events -- stream until the client disconnects or shutdown.
pub async fn events_handler(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.engine.bus.subscribe(&ctx.tenant_id);
    tracing::debug!(tenant_id = %ctx.tenant_id, "realtime event stream opened");

    let events = stream::unfold(subscription, |mut sub| async move {
        let envelope = sub.recv().await?;
        Some((envelope, sub))
    })
    .map(|envelope| Ok(to_event(&envelope)))
    .take_until(state.shutdown.cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_event(envelope: &EventEnvelope) -> Event {
    let event = Event::default()
        .event(envelope.event.event_type())
        .id(envelope.event_id.clone());
    match serde_json::to_string(envelope) {
        Ok(data) => event.data(data),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize realtime event");
            Event::default()
                .event("error")
                .data(r#"{"error": "event serialization failed"}"#)
        }
    }
}
