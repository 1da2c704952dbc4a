// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging provider trait (WhatsApp Cloud API, Messenger Send API).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageKind, Platform, ProviderCredentials};

/// What a platform allows, consulted by the send path instead of
/// comparing platform names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Free-form window after the contact's last inbound message.
    /// `None` means the platform does not restrict free-form sends.
    pub session_window: Option<Duration>,
}

impl PlatformCapabilities {
    pub const WHATSAPP_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
}

/// A single outbound message handed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Phone number or page-scoped user id.
    pub recipient: String,
    pub kind: MessageKind,
    pub body: String,
    pub media_ref: Option<String>,
    /// Template name for template sends.
    pub template_name: Option<String>,
    pub template_language: Option<String>,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub provider_message_id: String,
}

/// Why a dispatch did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The provider refused the message; retrying will not help.
    #[error("provider rejected message: {message}")]
    Rejected { message: String },
    /// Rate limiting, 5xx, or connection failure; may succeed on retry.
    #[error("transient provider failure: {message}")]
    Transient { message: String },
    /// No answer from the provider within the dispatch deadline.
    #[error("dispatch timed out")]
    Timeout,
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Transient { .. })
    }
}

/// Adapter for an outbound messaging platform.
#[async_trait]
pub trait MessagingProvider: PluginAdapter {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> PlatformCapabilities;

    /// Sends one message using the tenant's connected account.
    async fn send(
        &self,
        credentials: &ProviderCredentials,
        request: &OutboundRequest,
    ) -> Result<ProviderReceipt, DispatchError>;
}
