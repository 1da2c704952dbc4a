// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Aina messaging platform.
//!
//! Shared domain types, the error taxonomy, the clock abstraction, and the
//! adapter traits every other Aina crate builds on.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AinaError;
pub use types::{
    AdapterType, AuthContext, AutomationRule, Campaign, CampaignId, CampaignStats,
    CampaignStatus, Conversation, ConversationId, Credits, Direction,
    EntryId, HealthStatus, LedgerEntry, LedgerKind, Message, MessageId, MessageKind,
    MessageStatus, OrderStatus, PaymentOrder, Platform, ProviderCredentials, Role, RuleId,
    StatusTransition, Tenant, TenantId, TenantStatus, TriggerType,
};

pub use traits::{
    DispatchError, MessagingProvider, OutboundRequest, PlatformCapabilities, PluginAdapter,
    ProviderReceipt,
};
