// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by every Aina crate.
//!
//! Entities carry their tenant id; the tenant id is the only isolation
//! boundary in the system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a tenant.
    TenantId
);
string_id!(
    /// Unique identifier for a conversation.
    ConversationId
);
string_id!(
    /// Unique identifier for a stored message.
    MessageId
);
string_id!(
    /// Unique identifier for a ledger entry.
    EntryId
);
string_id!(
    /// Unique identifier for an automation rule.
    RuleId
);
string_id!(
    /// Unique identifier for a broadcast campaign.
    CampaignId
);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Observability,
}

// --- Credits ---

/// Signed fixed-point credit amount in hundredths of a credit unit.
///
/// `Credits::from_minor(150)` is 1.50 credits. Serialized as a decimal string
/// (`"1.50"`); deserialized from either a string or a JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    /// Construct from minor units (hundredths).
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Construct from whole credit units.
    pub const fn whole(units: i64) -> Self {
        Self(units * 100)
    }

    /// The amount in minor units (hundredths).
    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Credits) -> Option<Credits> {
        self.0.checked_add(other.0).map(Credits)
    }

    pub fn checked_sub(self, other: Credits) -> Option<Credits> {
        self.0.checked_sub(other.0).map(Credits)
    }

    pub fn checked_neg(self) -> Option<Credits> {
        self.0.checked_neg().map(Credits)
    }

    pub fn abs(self) -> Credits {
        Credits(self.0.saturating_abs())
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Error returned when a credit amount cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credit amount `{0}`")]
pub struct ParseCreditsError(String);

impl FromStr for Credits {
    type Err = ParseCreditsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCreditsError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };
        let minor = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(err)?;
        Ok(Credits(if negative { -minor } else { minor }))
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(units) => units
                .checked_mul(100)
                .map(Credits)
                .ok_or_else(|| serde::de::Error::custom("credit amount out of range")),
            Raw::Float(value) => {
                let scaled = (value * 100.0).round();
                if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
                    return Err(serde::de::Error::custom("credit amount out of range"));
                }
                Ok(Credits(scaled as i64))
            }
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

// --- Enumerations ---

/// Lifecycle status of a tenant account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Suspended,
    PendingVerification,
}

/// Messaging platform a conversation lives on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[strum(serialize = "whatsapp")]
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Messenger,
}

/// What caused a ledger entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    Purchase,
    AdminCredit,
    AdminDebit,
    MessageCharge,
    Refund,
}

/// Whether a message came from the contact or was sent by the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// The billable shape of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Template,
    Media,
    /// Interactive messages, including flows.
    Interactive,
}

impl MessageKind {
    /// Free-form messages may only be sent inside an open session window.
    pub fn is_free_form(self) -> bool {
        !matches!(self, MessageKind::Template)
    }
}

/// Delivery status of a message.
///
/// Status only moves forward: QUEUED -> SENT -> DELIVERED -> READ, with
/// FAILED reachable from QUEUED or SENT. READ and FAILED are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Outcome of applying a status update to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The status moved forward.
    Advanced,
    /// The update repeats the current status; nothing to do.
    Unchanged,
    /// The update would move backwards or leave a terminal state.
    Rejected,
}

impl MessageStatus {
    fn rank(self) -> u8 {
        match self {
            MessageStatus::Queued => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Read | MessageStatus::Failed)
    }

    /// Classify the transition from `self` to `next`.
    ///
    /// Forward skips (SENT -> READ) are allowed because provider callbacks
    /// can arrive out of order or be coalesced.
    pub fn advance(self, next: MessageStatus) -> StatusTransition {
        if self == next {
            return StatusTransition::Unchanged;
        }
        match (self, next) {
            (MessageStatus::Queued | MessageStatus::Sent, MessageStatus::Failed) => {
                StatusTransition::Advanced
            }
            (_, MessageStatus::Failed) | (MessageStatus::Failed, _) => StatusTransition::Rejected,
            (current, next) if next.rank() > current.rank() => StatusTransition::Advanced,
            _ => StatusTransition::Rejected,
        }
    }

    /// Statuses from which `next` is a valid forward transition.
    pub fn predecessors(next: MessageStatus) -> Vec<MessageStatus> {
        [
            MessageStatus::Queued,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
            MessageStatus::Failed,
        ]
        .into_iter()
        .filter(|s| s.advance(next) == StatusTransition::Advanced)
        .collect()
    }
}

/// Automation trigger semantics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    /// Normalized text must equal one of the keywords.
    ExactMatch,
    /// Normalized text must contain one of the keywords.
    KeywordMatch,
}

/// Status of a credit-pack payment order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// Lifecycle of a broadcast campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Created, not yet launched. The only state that may be launched.
    Draft,
    /// Recipients are being messaged.
    Sending,
    /// Every recipient was attempted.
    Completed,
    /// Stopped early: the tenant ran out of credit, was suspended, or the
    /// run was interrupted.
    Failed,
}

// --- Entities ---

/// Provider credentials a tenant has connected.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub whatsapp_phone_number_id: Option<String>,
    #[serde(default)]
    pub whatsapp_access_token: Option<String>,
    #[serde(default)]
    pub messenger_page_id: Option<String>,
    #[serde(default)]
    pub messenger_page_token: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("whatsapp_phone_number_id", &self.whatsapp_phone_number_id)
            .field(
                "whatsapp_access_token",
                &self.whatsapp_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("messenger_page_id", &self.messenger_page_id)
            .field(
                "messenger_page_token",
                &self.messenger_page_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// A paying business account.
#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub status: TenantStatus,
    /// Cached running sum of the tenant's ledger entries.
    pub balance: Credits,
    pub plan: Option<String>,
    #[serde(skip)]
    pub credentials: ProviderCredentials,
    pub created_at: DateTime<Utc>,
}

/// One immutable signed-amount record of a balance change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub tenant_id: TenantId,
    pub amount: Credits,
    pub kind: LedgerKind,
    pub description: String,
    /// Who authorized the entry; `None` for system-generated entries.
    pub actor_id: Option<String>,
    /// Idempotency key (payment order id, refunded charge id).
    pub reference: Option<String>,
    pub balance_after: Credits,
    pub created_at: DateTime<Utc>,
}

/// A thread with one contact on one platform.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: TenantId,
    pub platform: Platform,
    /// Phone number (WhatsApp) or page-scoped user id (Messenger).
    pub contact_id: String,
    pub contact_name: Option<String>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored message, inbound or outbound.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub tenant_id: TenantId,
    pub platform: Platform,
    pub direction: Direction,
    pub kind: MessageKind,
    pub body: String,
    pub media_ref: Option<String>,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    /// Credit charged for an outbound send.
    pub cost: Credits,
    pub charge_entry_id: Option<EntryId>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tenant-configured keyword-triggered auto-reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub trigger: TriggerType,
    pub keywords: Vec<String>,
    pub response: String,
    pub active: bool,
    /// Insertion order; lower positions win ties.
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// A template broadcast to a fixed audience on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub platform: Platform,
    pub template_name: String,
    pub template_language: Option<String>,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Per-recipient outcome counts, derived from the message log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignStats {
    pub total: u64,
    /// Not attempted yet, or held after an ambiguous dispatch timeout.
    pub pending: u64,
    /// Accepted by the provider (includes delivered and read).
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
}

/// A pending or settled credit-pack purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    pub id: String,
    pub tenant_id: TenantId,
    pub pack_id: String,
    pub credits: Credits,
    /// Price in INR minor units (paise).
    pub price_minor: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

// --- Auth context ---

/// Role of an authenticated caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A tenant's agent: may act on its own tenant only.
    Agent,
    /// Platform administrator: may run admin operations on any tenant.
    Admin,
    /// Internal system actor (webhook pipeline, payment confirmation).
    System,
}

/// Identity of the caller, threaded explicitly through every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub tenant_id: TenantId,
    pub actor_id: Option<String>,
    pub role: Role,
}

impl AuthContext {
    pub fn agent(tenant_id: TenantId, actor_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            actor_id: Some(actor_id.into()),
            role: Role::Agent,
        }
    }

    pub fn admin(tenant_id: TenantId, actor_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            actor_id: Some(actor_id.into()),
            role: Role::Admin,
        }
    }

    /// System context scoped to one tenant (auto-replies, webhooks).
    pub fn system(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor_id: None,
            role: Role::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reject any tenant-scoped operation on another tenant's data.
    pub fn authorize_tenant(&self, target: &TenantId) -> Result<(), crate::AinaError> {
        if &self.tenant_id == target {
            Ok(())
        } else {
            Err(crate::AinaError::TenantMismatch {
                caller: self.tenant_id.to_string(),
                target: target.to_string(),
            })
        }
    }

    /// Admin operations may target any tenant but require the admin role.
    pub fn require_admin(&self) -> Result<(), crate::AinaError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(crate::AinaError::Forbidden(
                "operation requires the admin role".to_string(),
            ))
        }
    }
}
