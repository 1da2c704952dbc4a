// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging provider for deterministic testing.
//!
//! `MockProvider` implements `MessagingProvider` with a scripted queue of
//! outcomes and records every request it receives, so tests can drive the
//! send path without calling the WhatsApp or Messenger APIs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use aina_core::{
    AdapterType, AinaError, DispatchError, HealthStatus, MessagingProvider, OutboundRequest,
    Platform, PlatformCapabilities, PluginAdapter, ProviderCredentials, ProviderReceipt,
};

/// What the mock does with the next request.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Accept with a generated provider message id.
    Accept,
    /// Accept with a fixed provider message id.
    AcceptAs(String),
    /// Permanent refusal with the given error text.
    Reject(String),
    /// Retryable failure (rate limit, 5xx).
    Transient(String),
    /// Never answer within any reasonable deadline.
    Hang,
}

/// A mock provider with a FIFO queue of outcomes.
///
/// When the queue is empty every request is accepted.
pub struct MockProvider {
    platform: Platform,
    window: Option<Duration>,
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// A WhatsApp-like provider with the 24-hour window.
    pub fn whatsapp() -> Self {
        Self::new(
            Platform::WhatsApp,
            Some(PlatformCapabilities::WHATSAPP_WINDOW),
        )
    }

    /// A Messenger-like provider without a window.
    pub fn messenger() -> Self {
        Self::new(Platform::Messenger, None)
    }

    pub fn new(platform: Platform, window: Option<Duration>) -> Self {
        Self {
            platform,
            window,
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue the outcome of a future request.
    pub async fn push_outcome(&self, outcome: MockOutcome) {
        self.outcomes.lock().await.push_back(outcome);
    }

    /// Requests the provider accepted, in order.
    pub async fn sent(&self) -> Vec<OutboundRequest> {
        self.requests.lock().await.clone()
    }

    /// Total send attempts, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        match self.platform {
            Platform::WhatsApp => "mock-whatsapp",
            Platform::Messenger => "mock-messenger",
        }
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
impl MessagingProvider for MockProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            session_window: self.window,
        }
    }

    async fn send(
        &self,
        _credentials: &ProviderCredentials,
        request: &OutboundRequest,
    ) -> Result<ProviderReceipt, DispatchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or(MockOutcome::Accept);
        let accepted_id = match outcome {
            MockOutcome::Accept => format!("mock.{}.{n}", self.platform),
            MockOutcome::AcceptAs(id) => id,
            MockOutcome::Reject(message) => return Err(DispatchError::Rejected { message }),
            MockOutcome::Transient(message) => return Err(DispatchError::Transient { message }),
            MockOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Err(DispatchError::Timeout);
            }
        };
        self.requests.lock().await.push(request.clone());
        Ok(ProviderReceipt {
            provider_message_id: accepted_id,
        })
    }
}
