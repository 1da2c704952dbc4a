// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant broadcast fan-out.
//!
//! Each tenant with at least one live subscriber has its own bounded
//! `broadcast` channel. Publishing never blocks: with no subscribers the
//! event is discarded, and a subscriber that falls more than `capacity`
//! events behind is handed a `resync` notice instead of the missed events.

use aina_core::TenantId;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{EventEnvelope, RealtimeEvent};

/// Tenant-scoped realtime event bus.
pub struct EventBus {
    channels: DashMap<TenantId, broadcast::Sender<EventEnvelope>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose per-tenant channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event to a tenant's live subscribers.
    ///
    /// Returns the number of subscribers that received it (0 when nobody is
    /// listening). Never fails.
    pub fn publish(&self, tenant_id: &TenantId, event: RealtimeEvent) -> usize {
        let event_type = event.event_type();
        let delivered = match self.channels.get(tenant_id) {
            Some(tx) => tx
                .send(EventEnvelope::new(tenant_id.clone(), event))
                .unwrap_or(0),
            None => return 0,
        };
        if delivered == 0 {
            // Every receiver has gone away; drop the channel until someone resubscribes.
            self.channels
                .remove_if(tenant_id, |_, tx| tx.receiver_count() == 0);
        }
        debug!(tenant_id = %tenant_id, event_type, delivered, "realtime event published");
        delivered
    }

    /// Subscribe to a tenant's events.
    pub fn subscribe(&self, tenant_id: &TenantId) -> Subscription {
        let rx = self
            .channels
            .entry(tenant_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Subscription {
            tenant_id: tenant_id.clone(),
            rx,
        }
    }

    /// Number of live subscribers for a tenant.
    pub fn subscriber_count(&self, tenant_id: &TenantId) -> usize {
        self.channels
            .get(tenant_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// One client's view of a tenant's event stream.
pub struct Subscription {
    tenant_id: TenantId,
    rx: broadcast::Receiver<EventEnvelope>,
}

impl Subscription {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Wait for the next event. Returns `None` once the bus is gone.
    ///
    /// If this subscriber lagged, a `resync` event is yielded first and the
    /// stream continues from the oldest retained event.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        match self.rx.recv().await {
            Ok(envelope) => Some(envelope),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(tenant_id = %self.tenant_id, missed, "realtime subscriber lagged");
                Some(EventEnvelope::new(
                    self.tenant_id.clone(),
                    RealtimeEvent::Resync { missed },
                ))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aina_core::ConversationId;

    fn assigned(n: usize) -> RealtimeEvent {
        RealtimeEvent::ConversationAssigned {
            conversation_id: ConversationId::from(format!("c-{n}")),
            assigned_agent: None,
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(&TenantId::from("acme"), assigned(1)), 0);
    }

    #[tokio::test]
    async fn events_are_tenant_scoped() {
        let bus = EventBus::new(8);
        let mut acme = bus.subscribe(&TenantId::from("acme"));
        let mut globex = bus.subscribe(&TenantId::from("globex"));

        assert_eq!(bus.publish(&TenantId::from("acme"), assigned(1)), 1);

        let got = acme.recv().await.unwrap();
        assert_eq!(got.tenant_id, TenantId::from("acme"));
        assert_eq!(got.event.event_type(), "conversation.assigned");
        assert!(globex.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let bus = EventBus::new(2);
        let tenant = TenantId::from("acme");
        let mut sub = bus.subscribe(&tenant);
        for i in 0..5 {
            bus.publish(&tenant, assigned(i));
        }
        let first = sub.recv().await.unwrap();
        match first.event {
            RealtimeEvent::Resync { missed } => assert_eq!(missed, 3),
            other => panic!("expected resync, got {other:?}"),
        }
        let next = sub.recv().await.unwrap();
        assert_eq!(next.event.event_type(), "conversation.assigned");
    }

    #[tokio::test]
    async fn idle_channel_is_dropped_after_last_subscriber_leaves() {
        let bus = EventBus::new(4);
        let tenant = TenantId::from("acme");
        let sub = bus.subscribe(&tenant);
        assert_eq!(bus.subscriber_count(&tenant), 1);
        drop(sub);
        assert_eq!(bus.publish(&tenant, assigned(1)), 0);
        assert!(bus.channels.get(&tenant).is_none());
    }
}
