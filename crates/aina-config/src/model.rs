// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Aina messaging platform.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level Aina configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AinaConfig {
    /// Process-level settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway and API token settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider webhook verification settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// WhatsApp Cloud API settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Messenger Send API settings.
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// Per-message credit prices.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Outbound dispatch behavior.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Realtime fan-out settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Credit packs and payment confirmation.
    #[serde(default)]
    pub billing: BillingConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Capacity of the queue between webhook receipt and ingestion.
    #[serde(default = "default_ingest_queue")]
    pub ingest_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ingest_queue_capacity: default_ingest_queue(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ingest_queue() -> usize {
    1024
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("aina").join("aina.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("aina.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Role granted to an API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Agent,
    Admin,
}

/// A bearer token mapped to a tenant-scoped identity.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiTokenConfig {
    /// The bearer token value.
    pub token: String,
    /// Tenant the caller acts for.
    pub tenant_id: String,
    #[serde(default = "default_token_role")]
    pub role: TokenRole,
    /// Recorded as the actor on ledger entries and assignments.
    pub actor_id: String,
}

impl fmt::Debug for ApiTokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokenConfig")
            .field("token", &"[redacted]")
            .field("tenant_id", &self.tenant_id)
            .field("role", &self.role)
            .field("actor_id", &self.actor_id)
            .finish()
    }
}

fn default_token_role() -> TokenRole {
    TokenRole::Agent
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// API tokens accepted on `/v1/*`.
    #[serde(default)]
    pub tokens: Vec<ApiTokenConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            tokens: Vec::new(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Provider webhook verification configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Token echoed back during the subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256`. `None` disables verification.
    #[serde(default)]
    pub app_secret: Option<String>,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[redacted]"))
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL including version.
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,

    /// Free-form session window in hours. `None` disables the window.
    #[serde(default = "default_whatsapp_window")]
    pub session_window_hours: Option<u32>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base: default_graph_api_base(),
            session_window_hours: default_whatsapp_window(),
        }
    }
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_whatsapp_window() -> Option<u32> {
    Some(24)
}

/// Messenger Send API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    /// Graph API base URL including version.
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,

    /// Free-form session window in hours. Unset by default.
    #[serde(default)]
    pub session_window_hours: Option<u32>,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            api_base: default_graph_api_base(),
            session_window_hours: None,
        }
    }
}

/// Per-message credit prices, in credit units.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    #[serde(default = "default_text_price")]
    pub text: f64,
    #[serde(default = "default_template_price")]
    pub template: f64,
    #[serde(default = "default_media_price")]
    pub media: f64,
    #[serde(default = "default_interactive_price")]
    pub interactive: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            text: default_text_price(),
            template: default_template_price(),
            media: default_media_price(),
            interactive: default_interactive_price(),
        }
    }
}

fn default_text_price() -> f64 {
    1.0
}

fn default_template_price() -> f64 {
    1.5
}

fn default_media_price() -> f64 {
    2.0
}

fn default_interactive_price() -> f64 {
    1.0
}

/// What to do with a charged message whose dispatch timed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Refund the charge and mark the message FAILED.
    #[default]
    Refund,
    /// Keep the charge and leave the message QUEUED for reconciliation.
    Hold,
}

/// Outbound dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Overall deadline for one dispatch including retries.
    #[serde(default = "default_dispatch_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dispatch_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            on_timeout: TimeoutPolicy::default(),
        }
    }
}

fn default_dispatch_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

/// Realtime fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Per-tenant broadcast buffer; slower subscribers receive a resync notice.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

/// A purchasable credit pack.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreditPackConfig {
    pub id: String,
    pub name: String,
    /// Whole credits granted.
    pub credits: i64,
    /// Price in INR (rupees).
    pub price_inr: i64,
    #[serde(default)]
    pub popular: bool,
}

/// Billing configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    #[serde(default = "default_packs")]
    pub packs: Vec<CreditPackConfig>,

    /// HMAC secret for payment confirmation webhooks. Without one the payment
    /// webhook rejects every notification.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BillingConfig")
            .field("packs", &self.packs)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            packs: default_packs(),
            webhook_secret: None,
        }
    }
}

fn default_packs() -> Vec<CreditPackConfig> {
    vec![
        CreditPackConfig {
            id: "starter".to_string(),
            name: "Starter Bundle".to_string(),
            credits: 1000,
            price_inr: 500,
            popular: false,
        },
        CreditPackConfig {
            id: "growth".to_string(),
            name: "Growth Pack".to_string(),
            credits: 5000,
            price_inr: 2000,
            popular: true,
        },
        CreditPackConfig {
            id: "enterprise".to_string(),
            name: "Enterprise Bulk".to_string(),
            credits: 20000,
            price_inr: 7000,
            popular: false,
        },
    ]
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
