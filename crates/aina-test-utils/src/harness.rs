// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full engine over a temp SQLite database, mock
//! providers and a manual clock. Helpers seed tenants and conversations and
//! feed webhook payloads through the real ingest pipeline.

use std::sync::Arc;

use aina_config::model::{AinaConfig, DispatchConfig, StorageConfig};
use aina_core::{
    AinaError, AuthContext, Clock, Conversation, Credits, ManualClock, Platform,
    ProviderCredentials, TenantId, TenantStatus,
};
use aina_engine::{Engine, IngestReport, NewTenant, ProviderRegistry};
use aina_storage::SqliteStorage;
use aina_storage::queries::conversations;
use chrono::{DateTime, TimeZone, Utc};

use crate::mock_provider::MockProvider;
use crate::payloads;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    dispatch: DispatchConfig,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            dispatch: DispatchConfig {
                timeout_secs: 1,
                retry_backoff_ms: 5,
                ..DispatchConfig::default()
            },
            start: Utc
                .with_ymd_and_hms(2026, 6, 1, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    /// Override the dispatch settings (timeouts, retries, timeout policy).
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Start the manual clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, AinaError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| AinaError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        let db = storage.initialize().await?;

        let config = AinaConfig {
            dispatch: self.dispatch,
            ..AinaConfig::default()
        };
        let whatsapp = Arc::new(MockProvider::whatsapp());
        let messenger = Arc::new(MockProvider::messenger());
        let providers = ProviderRegistry::new()
            .with(whatsapp.clone())
            .with(messenger.clone());
        let clock = Arc::new(ManualClock::new(self.start));
        let engine = Engine::new(&config, db, providers, clock.clone());

        Ok(TestHarness {
            engine,
            whatsapp,
            messenger,
            clock,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock providers and temp storage.
pub struct TestHarness {
    /// Every engine service, wired as in production.
    pub engine: Engine,
    /// The mock WhatsApp provider.
    pub whatsapp: Arc<MockProvider>,
    /// The mock Messenger provider.
    pub messenger: Arc<MockProvider>,
    /// Clock driving window and timestamp decisions.
    pub clock: Arc<ManualClock>,
    pub config: AinaConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, AinaError> {
        Self::builder().build().await
    }

    pub fn admin(&self) -> AuthContext {
        AuthContext::admin(TenantId::from("platform"), "ops-admin")
    }

    pub fn agent(&self, tenant: &str) -> AuthContext {
        AuthContext::agent(TenantId::from(tenant), "agent-1")
    }

    /// Create an ACTIVE tenant receiving on WhatsApp `phone_number_id` and
    /// Messenger page `page-{tenant}`, funded with `balance`.
    pub async fn create_tenant(
        &self,
        tenant: &str,
        phone_number_id: &str,
        balance: Credits,
    ) -> Result<TenantId, AinaError> {
        let admin = self.admin();
        let created = self
            .engine
            .admin
            .create_tenant(
                &admin,
                NewTenant {
                    id: TenantId::from(tenant),
                    name: format!("{tenant} ltd"),
                    plan: None,
                    status: TenantStatus::Active,
                    credentials: ProviderCredentials {
                        whatsapp_phone_number_id: Some(phone_number_id.to_string()),
                        whatsapp_access_token: Some(format!("token-{tenant}")),
                        messenger_page_id: Some(format!("page-{tenant}")),
                        messenger_page_token: Some(format!("page-token-{tenant}")),
                    },
                },
            )
            .await?;
        if balance.is_positive() {
            self.engine
                .admin
                .adjust_balance(&admin, &created.id, balance, "test funding")
                .await?;
        }
        Ok(created.id)
    }

    /// Deliver an inbound WhatsApp text at the current clock time.
    pub async fn receive_whatsapp_text(
        &self,
        phone_number_id: &str,
        from: &str,
        wamid: &str,
        text: &str,
    ) -> IngestReport {
        let body = payloads::whatsapp_text(phone_number_id, from, wamid, text, self.clock.now());
        self.deliver(Platform::WhatsApp, &body).await
    }

    /// Deliver a WhatsApp status callback.
    pub async fn whatsapp_status(
        &self,
        phone_number_id: &str,
        wamid: &str,
        status: &str,
    ) -> IngestReport {
        let body = payloads::whatsapp_status(phone_number_id, wamid, status, self.clock.now());
        self.deliver(Platform::WhatsApp, &body).await
    }

    /// Run a raw payload through the ingest pipeline and wait until every
    /// auto-reply it triggered has been dispatched.
    pub async fn deliver(&self, platform: Platform, body: &[u8]) -> IngestReport {
        let report = self.engine.ingest.process_payload(platform, body).await;
        self.engine.ingest.replies().wait_idle().await;
        report
    }

    /// The conversation with `contact_id`, if one exists.
    pub async fn conversation(
        &self,
        tenant: &TenantId,
        contact_id: &str,
    ) -> Result<Option<Conversation>, AinaError> {
        let all = conversations::list_conversations(
            self.engine.ledger.database(),
            tenant,
            conversations::ConversationFilter::All,
        )
        .await?;
        Ok(all.into_iter().find(|c| c.contact_id == contact_id))
    }

    pub async fn balance(&self, tenant: &TenantId) -> Result<Credits, AinaError> {
        self.engine.ledger.balance(tenant).await
    }
}
