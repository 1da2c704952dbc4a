// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger Send API adapter (`POST /{page_id}/messages`).

use std::time::Duration;

use aina_config::model::MessengerConfig;
use aina_core::{
    AdapterType, AinaError, DispatchError, HealthStatus, MessageKind, MessagingProvider,
    OutboundRequest, Platform, PlatformCapabilities, PluginAdapter, ProviderCredentials,
    ProviderReceipt,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::graph::GraphClient;

/// Facebook Messenger provider.
pub struct MessengerProvider {
    graph: GraphClient,
    capabilities: PlatformCapabilities,
}

impl MessengerProvider {
    pub fn new(config: &MessengerConfig) -> Result<Self, AinaError> {
        Ok(Self {
            graph: GraphClient::new(&config.api_base)?,
            capabilities: PlatformCapabilities {
                session_window: config
                    .session_window_hours
                    .map(|h| Duration::from_secs(u64::from(h) * 3600)),
            },
        })
    }
}

pub(crate) fn build_body(request: &OutboundRequest) -> Result<serde_json::Value, DispatchError> {
    let message = match request.kind {
        MessageKind::Text => json!({ "text": request.body }),
        // Messenger has no approved-template concept; a template send goes out
        // as a tagged update, which the platform allows outside the window.
        MessageKind::Template => {
            return Ok(json!({
                "recipient": { "id": request.recipient },
                "messaging_type": "MESSAGE_TAG",
                "tag": "ACCOUNT_UPDATE",
                "message": { "text": request.body },
            }));
        }
        MessageKind::Media => {
            let url = request
                .media_ref
                .as_deref()
                .ok_or_else(|| DispatchError::Rejected {
                    message: "media send without a media reference".to_string(),
                })?;
            json!({
                "attachment": {
                    "type": "image",
                    "payload": { "url": url, "is_reusable": true },
                }
            })
        }
        MessageKind::Interactive => {
            let payload: serde_json::Value =
                serde_json::from_str(&request.body).map_err(|e| DispatchError::Rejected {
                    message: format!("interactive body must be a JSON object: {e}"),
                })?;
            json!({ "attachment": { "type": "template", "payload": payload } })
        }
    };
    Ok(json!({
        "recipient": { "id": request.recipient },
        "messaging_type": "RESPONSE",
        "message": message,
    }))
}

#[async_trait]
impl PluginAdapter for MessengerProvider {
    fn name(&self) -> &str {
        "messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, AinaError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessagingProvider for MessengerProvider {
    fn platform(&self) -> Platform {
        Platform::Messenger
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    async fn send(
        &self,
        credentials: &ProviderCredentials,
        request: &OutboundRequest,
    ) -> Result<ProviderReceipt, DispatchError> {
        let (Some(page_id), Some(token)) = (
            credentials.messenger_page_id.as_deref(),
            credentials.messenger_page_token.as_deref(),
        ) else {
            return Err(DispatchError::Rejected {
                message: "tenant has no Messenger page connected".to_string(),
            });
        };

        let body = build_body(request)?;
        let response = self.graph.post_message(page_id, token, &body).await?;
        let provider_message_id = response["message_id"]
            .as_str()
            .ok_or_else(|| DispatchError::Rejected {
                message: "provider response carried no message id".to_string(),
            })?
            .to_string();
        debug!(provider_message_id = %provider_message_id, "messenger message accepted");
        Ok(ProviderReceipt {
            provider_message_id,
        })
    }
}
