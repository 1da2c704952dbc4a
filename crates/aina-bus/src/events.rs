// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed realtime events pushed to a tenant's connected clients.

use aina_core::{
    ConversationId, Credits, EntryId, LedgerKind, Message, MessageId, MessageStatus, TenantId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A state change visible to a tenant's live sessions.
///
/// Serialized adjacently tagged: `{"type": "message.created", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeEvent {
    #[serde(rename = "message.created")]
    MessageCreated { message: Message },

    #[serde(rename = "message.status_changed")]
    MessageStatusChanged {
        message_id: MessageId,
        conversation_id: ConversationId,
        status: MessageStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "balance.changed")]
    BalanceChanged {
        balance: Credits,
        entry_id: EntryId,
        kind: LedgerKind,
    },

    #[serde(rename = "conversation.assigned")]
    ConversationAssigned {
        conversation_id: ConversationId,
        assigned_agent: Option<String>,
    },

    /// The subscriber fell behind and missed events; it must re-fetch state.
    #[serde(rename = "resync")]
    Resync { missed: u64 },
}

impl RealtimeEvent {
    /// Wire name of the event, used as the SSE `event:` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message.created",
            Self::MessageStatusChanged { .. } => "message.status_changed",
            Self::BalanceChanged { .. } => "balance.changed",
            Self::ConversationAssigned { .. } => "conversation.assigned",
            Self::Resync { .. } => "resync",
        }
    }

    /// Build a `balance.changed` event from a committed ledger entry.
    pub fn balance_changed(entry: &aina_core::LedgerEntry) -> Self {
        Self::BalanceChanged {
            balance: entry.balance_after,
            entry_id: entry.id.clone(),
            kind: entry.kind,
        }
    }
}

/// An event plus delivery metadata.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

impl EventEnvelope {
    pub fn new(tenant_id: TenantId, event: RealtimeEvent) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            timestamp: Utc::now(),
            event,
        }
    }
}
