// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of messaging providers keyed by platform.

use std::collections::HashMap;
use std::sync::Arc;

use aina_core::{AinaError, HealthStatus, MessagingProvider, Platform, PlatformCapabilities};
use tracing::{info, warn};

/// The provider adapters the send path can dispatch through.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, Arc<dyn MessagingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for the platform it serves, replacing any earlier one.
    pub fn register(&mut self, provider: Arc<dyn MessagingProvider>) {
        let platform = provider.platform();
        info!(platform = %platform, adapter = %provider.label(), "provider registered");
        self.providers.insert(platform, provider);
    }

    pub fn with(mut self, provider: Arc<dyn MessagingProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn MessagingProvider>, AinaError> {
        self.providers
            .get(&platform)
            .cloned()
            .ok_or_else(|| AinaError::Validation(format!("no provider configured for {platform}")))
    }

    pub fn capabilities(&self, platform: Platform) -> Result<PlatformCapabilities, AinaError> {
        Ok(self.get(platform)?.capabilities())
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.providers.keys().copied()
    }

    /// Health of every registered provider, keyed by adapter name.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let mut report = Vec::with_capacity(self.providers.len());
        for provider in self.providers.values() {
            let status = match provider.health_check().await {
                Ok(status) => status,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            report.push((provider.name().to_string(), status));
        }
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    /// Shut every provider down, logging failures.
    pub async fn shutdown(&self) {
        for provider in self.providers.values() {
            if let Err(e) = provider.shutdown().await {
                warn!(adapter = %provider.label(), error = %e, "provider shutdown failed");
            }
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("platforms", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
