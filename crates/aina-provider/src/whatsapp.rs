// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API adapter (`POST /{phone_number_id}/messages`).

use std::time::Duration;

use aina_config::model::WhatsAppConfig;
use aina_core::{
    AdapterType, AinaError, DispatchError, HealthStatus, MessageKind, MessagingProvider,
    OutboundRequest, Platform, PlatformCapabilities, PluginAdapter, ProviderCredentials,
    ProviderReceipt,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::graph::GraphClient;

const DEFAULT_TEMPLATE_LANGUAGE: &str = "en_US";

/// WhatsApp Business Cloud API provider.
pub struct WhatsAppCloudProvider {
    graph: GraphClient,
    capabilities: PlatformCapabilities,
}

impl WhatsAppCloudProvider {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, AinaError> {
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

/// Build the Cloud API request body for one outbound message.
pub(crate) fn build_body(request: &OutboundRequest) -> Result<serde_json::Value, DispatchError> {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": request.recipient,
    });
    match request.kind {
        MessageKind::Text => {
            body["type"] = json!("text");
            body["text"] = json!({ "preview_url": false, "body": request.body });
        }
        MessageKind::Template => {
            let name = request
                .template_name
                .as_deref()
                .ok_or_else(|| DispatchError::Rejected {
                    message: "template send without a template name".to_string(),
                })?;
            body["type"] = json!("template");
            body["template"] = json!({
                "name": name,
                "language": {
                    "code": request
                        .template_language
                        .as_deref()
                        .unwrap_or(DEFAULT_TEMPLATE_LANGUAGE)
                },
            });
        }
        MessageKind::Media => {
            let media_ref = request
                .media_ref
                .as_deref()
                .ok_or_else(|| DispatchError::Rejected {
                    message: "media send without a media reference".to_string(),
                })?;
            let mut image = if media_ref.starts_with("https://") || media_ref.starts_with("http://") {
                json!({ "link": media_ref })
            } else {
                json!({ "id": media_ref })
            };
            if !request.body.is_empty() {
                image["caption"] = json!(request.body);
            }
            body["type"] = json!("image");
            body["image"] = image;
        }
        MessageKind::Interactive => {
            let interactive: serde_json::Value =
                serde_json::from_str(&request.body).map_err(|e| DispatchError::Rejected {
                    message: format!("interactive body must be a JSON object: {e}"),
                })?;
            if !interactive.is_object() {
                return Err(DispatchError::Rejected {
                    message: "interactive body must be a JSON object".to_string(),
                });
            }
            body["type"] = json!("interactive");
            body["interactive"] = interactive;
        }
    }
    Ok(body)
}

#[async_trait]
impl PluginAdapter for WhatsAppCloudProvider {
    fn name(&self) -> &str {
        "whatsapp-cloud"
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
impl MessagingProvider for WhatsAppCloudProvider {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    async fn send(
        &self,
        credentials: &ProviderCredentials,
        request: &OutboundRequest,
    ) -> Result<ProviderReceipt, DispatchError> {
        let (Some(phone_number_id), Some(token)) = (
            credentials.whatsapp_phone_number_id.as_deref(),
            credentials.whatsapp_access_token.as_deref(),
        ) else {
            return Err(DispatchError::Rejected {
                message: "tenant has no WhatsApp number connected".to_string(),
            });
        };

        let body = build_body(request)?;
        let response = self.graph.post_message(phone_number_id, token, &body).await?;
        let provider_message_id = response["messages"][0]["id"]
            .as_str()
            .ok_or_else(|| DispatchError::Rejected {
                message: "provider response carried no message id".to_string(),
            })?
            .to_string();
        debug!(provider_message_id = %provider_message_id, "whatsapp message accepted");
        Ok(ProviderReceipt {
            provider_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> WhatsAppCloudProvider {
        WhatsAppCloudProvider::new(&WhatsAppConfig {
            api_base: base.to_string(),
            session_window_hours: Some(24),
        })
        .unwrap()
    }

    fn credentials() -> ProviderCredentials {
        ProviderCredentials {
            whatsapp_phone_number_id: Some("1001".into()),
            whatsapp_access_token: Some("wa-token".into()),
            ..Default::default()
        }
    }

    fn text(body: &str) -> OutboundRequest {
        OutboundRequest {
            recipient: "+919800000001".into(),
            kind: MessageKind::Text,
            body: body.into(),
            media_ref: None,
            template_name: None,
            template_language: None,
        }
    }

    #[tokio::test]
    async fn sends_text_and_returns_wamid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1001/messages"))
            .and(header("authorization", "Bearer wa-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "+919800000001",
                "type": "text",
                "text": { "body": "hello" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": "+919800000001", "wa_id": "919800000001" }],
                "messages": [{ "id": "wamid.ABC" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = provider(&server.uri())
            .send(&credentials(), &text("hello"))
            .await
            .unwrap();
        assert_eq!(receipt.provider_message_id, "wamid.ABC");
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Too many calls", "type": "OAuthException", "code": 80007 }
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .send(&credentials(), &text("hello"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
        assert!(err.to_string().contains("Too many calls"));
    }

    #[tokio::test]
    async fn bad_request_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid parameter", "type": "OAuthException", "code": 100 }
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .send(&credentials(), &text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
    }

    #[tokio::test]
    async fn missing_credentials_rejected_without_calling_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .send(&ProviderCredentials::default(), &text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));
    }

    #[test]
    fn template_body_uses_language_default() {
        let mut request = text("");
        request.kind = MessageKind::Template;
        request.template_name = Some("order_update".into());
        let body = build_body(&request).unwrap();
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["name"], "order_update");
        assert_eq!(body["template"]["language"]["code"], "en_US");

        request.template_name = None;
        assert!(build_body(&request).is_err());
    }

    #[test]
    fn media_body_distinguishes_link_and_id() {
        let mut request = text("invoice");
        request.kind = MessageKind::Media;
        request.media_ref = Some("https://cdn.example.com/a.png".into());
        let body = build_body(&request).unwrap();
        assert_eq!(body["image"]["link"], "https://cdn.example.com/a.png");
        assert_eq!(body["image"]["caption"], "invoice");

        request.media_ref = Some("media-123".into());
        let body = build_body(&request).unwrap();
        assert_eq!(body["image"]["id"], "media-123");
    }

    #[test]
    fn window_comes_from_config() {
        let p = provider("http://localhost");
        assert_eq!(
            p.capabilities().session_window,
            Some(PlatformCapabilities::WHATSAPP_WINDOW)
        );
    }
}
