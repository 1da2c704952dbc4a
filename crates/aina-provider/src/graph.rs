// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal Graph API client shared by the WhatsApp and Messenger adapters.
//!
//! One POST per call. Retrying is the send path's job; this module only
//! classifies failures as transient or permanent.

use std::time::Duration;

use aina_core::{AinaError, DispatchError};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Graph API error envelope: `{"error": {"message": ..., "type": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(default, rename = "type")]
    type_: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct GraphClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    pub(crate) fn new(base_url: &str) -> Result<Self, AinaError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AinaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `POST {base}/{node}/messages` with a bearer token. Returns the parsed
    /// success body.
    pub(crate) async fn post_message(
        &self,
        node_id: &str,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let url = format!("{}/{node_id}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::Transient {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        debug!(status = %status, node_id, "graph response received");
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| DispatchError::Rejected {
                message: format!("unparseable provider response: {e}"),
            });
        }

        let message = match serde_json::from_str::<GraphErrorResponse>(&text) {
            Ok(err) => format!(
                "graph API error ({}{}): {}",
                err.error.type_.as_deref().unwrap_or("unknown"),
                err.error.code.map(|c| format!(" {c}")).unwrap_or_default(),
                err.error.message
            ),
            Err(_) => format!("provider returned {status}: {text}"),
        };
        if is_transient_status(status) {
            Err(DispatchError::Transient { message })
        } else {
            Err(DispatchError::Rejected { message })
        }
    }
}

/// Rate limiting and server-side failures are worth retrying.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }
}
