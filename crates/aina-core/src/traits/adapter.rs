// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle trait shared by provider clients, storage and the metrics exporter.

use async_trait::async_trait;

use crate::error::AinaError;
use crate::types::{AdapterType, HealthStatus};

/// Something the process starts, probes for health, and stops.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Stable identifier used in logs and the `/health` report.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// `name@version`, for log fields.
    fn label(&self) -> String {
        format!("{}@{}", self.name(), self.version())
    }

    async fn health_check(&self) -> Result<HealthStatus, AinaError>;

    /// Release held resources. Adapters without any keep the default.
    async fn shutdown(&self) -> Result<(), AinaError> {
        Ok(())
    }
}
