// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging engine for the Aina platform.
//!
//! The [`Engine`] wires the services that sit between the HTTP surface and
//! storage:
//! - [`send::SendService`] enforces the session window and credit balance
//!   and compensates failed dispatches
//! - [`ingest::IngestPipeline`] turns provider webhooks into stored messages,
//!   auto-replies and realtime events
//! - [`campaigns::CampaignService`] broadcasts templates to an audience
//! - tenant-scoped services for conversations, automations and billing,
//!   plus platform administration

pub mod admin;
pub mod automations;
pub mod billing;
pub mod campaigns;
pub mod conversations;
pub mod ingest;
pub mod providers;
pub mod replies;
pub mod send;
pub mod shutdown;
pub mod window;

use std::sync::Arc;

use aina_bus::EventBus;
use aina_config::model::AinaConfig;
use aina_core::Clock;
use aina_ledger::{CreditLedger, PriceTable};
use aina_storage::Database;
use tracing::info;

pub use admin::{NewTenant, TenantAdmin};
pub use automations::AutomationService;
pub use billing::{BillingService, PaymentNotification, PaymentOutcome};
pub use campaigns::{CampaignDraft, CampaignReport, CampaignService};
pub use conversations::ConversationService;
pub use ingest::{IngestPipeline, IngestReport, Ingestor};
pub use providers::ProviderRegistry;
pub use replies::AutoReplier;
pub use send::{ReconcileOutcome, SendRequest, SendService};
pub use window::{SessionView, WindowState};

/// Every engine service, sharing one database, bus and clock.
#[derive(Clone)]
pub struct Engine {
    pub ledger: CreditLedger,
    pub bus: Arc<EventBus>,
    pub send: SendService,
    pub ingest: Arc<IngestPipeline>,
    pub conversations: ConversationService,
    pub automations: AutomationService,
    pub admin: TenantAdmin,
    pub billing: BillingService,
    pub campaigns: CampaignService,
}

impl Engine {
    pub fn new(
        config: &AinaConfig,
        db: Database,
        providers: ProviderRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bus = Arc::new(EventBus::new(config.realtime.channel_capacity));
        let ledger = CreditLedger::new(db.clone(), clock.clone());
        let prices = PriceTable::from_config(&config.pricing);
        let send = SendService::new(
            ledger.clone(),
            providers.clone(),
            prices,
            bus.clone(),
            clock.clone(),
            config.dispatch.clone(),
        );
        let ingest = Arc::new(IngestPipeline::new(
            db.clone(),
            send.clone(),
            bus.clone(),
            clock.clone(),
        ));
        let conversations =
            ConversationService::new(db.clone(), providers.clone(), bus.clone(), clock.clone());
        let automations = AutomationService::new(db.clone(), clock.clone());
        let campaigns = CampaignService::new(db, send.clone(), clock.clone());
        let admin = TenantAdmin::new(ledger.clone(), bus.clone(), clock.clone());
        let billing = BillingService::new(
            ledger.clone(),
            config.billing.packs.clone(),
            bus.clone(),
            clock,
        );
        info!(
            platforms = ?providers.platforms().collect::<Vec<_>>(),
            on_timeout = ?config.dispatch.on_timeout,
            "engine initialized"
        );
        Self {
            ledger,
            bus,
            send,
            ingest,
            conversations,
            automations,
            admin,
            billing,
            campaigns,
        }
    }
}
