// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-level owner of the SQLite database.
//!
//! `SqliteStorage` opens the file once, hands out [`Database`] handles to the
//! engine and takes part in health reporting and shutdown like any other
//! adapter.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use aina_config::model::StorageConfig;
use aina_core::{AdapterType, AinaError, HealthStatus, PluginAdapter};

use crate::database::{Database, map_tr_err};

pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

fn not_open() -> AinaError {
    AinaError::Storage {
        source: "storage not initialized".into(),
    }
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the configured file and migrate it. Fails if called twice.
    pub async fn initialize(&self) -> Result<Database, AinaError> {
        if self.db.initialized() {
            return Err(AinaError::Storage {
                source: "storage already initialized".into(),
            });
        }
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db.clone()).map_err(|_| AinaError::Storage {
            source: "storage already initialized".into(),
        })?;
        info!(
            path = %self.config.database_path,
            wal = self.config.wal_mode,
            "sqlite storage opened"
        );
        Ok(db)
    }

    pub fn database(&self) -> Result<&Database, AinaError> {
        self.db.get().ok_or_else(not_open)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    /// Round-trips a trivial query through the connection thread.
    async fn health_check(&self) -> Result<HealthStatus, AinaError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy(not_open().to_string()));
        };
        let one: i64 = db
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get(0)))
            .await
            .map_err(map_tr_err)?;
        Ok(if one == 1 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(format!("unexpected probe result {one}"))
        })
    }

    /// Checkpoint and close. A never-opened storage has nothing to do.
    async fn shutdown(&self) -> Result<(), AinaError> {
        match self.db.get() {
            Some(db) => {
                db.close().await?;
                debug!("sqlite storage closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
