// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-scoped conversation operations for the agent inbox.

use std::sync::Arc;

use aina_bus::{EventBus, RealtimeEvent};
use aina_core::{AinaError, AuthContext, Clock, Conversation, ConversationId, Message};
use aina_storage::Database;
use aina_storage::queries::conversations::{self, ConversationFilter};
use aina_storage::queries::messages;
use tracing::info;

use crate::providers::ProviderRegistry;
use crate::window::SessionView;

/// Upper bound on messages returned for one conversation.
pub const MAX_MESSAGE_PAGE: usize = 500;

#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    providers: ProviderRegistry,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl ConversationService {
    pub fn new(
        db: Database,
        providers: ProviderRegistry,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            providers,
            bus,
            clock,
        }
    }

    /// Load a conversation the caller's tenant owns.
    pub async fn get(
        &self,
        ctx: &AuthContext,
        id: &ConversationId,
    ) -> Result<Conversation, AinaError> {
        let conversation = conversations::get_conversation(&self.db, id)
            .await?
            .ok_or_else(|| AinaError::not_found("conversation", id.as_str()))?;
        ctx.authorize_tenant(&conversation.tenant_id)?;
        Ok(conversation)
    }

    pub async fn list(
        &self,
        ctx: &AuthContext,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, AinaError> {
        conversations::list_conversations(&self.db, &ctx.tenant_id, filter).await
    }

    pub async fn messages(
        &self,
        ctx: &AuthContext,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, AinaError> {
        self.get(ctx, id).await?;
        messages::list_messages(&self.db, id, limit.clamp(1, MAX_MESSAGE_PAGE)).await
    }

    /// Whether free-form messages may be sent into the conversation now.
    pub async fn session_state(
        &self,
        ctx: &AuthContext,
        id: &ConversationId,
    ) -> Result<SessionView, AinaError> {
        let conversation = self.get(ctx, id).await?;
        let window = self
            .providers
            .capabilities(conversation.platform)?
            .session_window;
        Ok(SessionView::of(&conversation, window, self.clock.now()))
    }

    /// Assign the conversation to an agent, or unassign it with `None`.
    pub async fn assign(
        &self,
        ctx: &AuthContext,
        id: &ConversationId,
        agent: Option<String>,
    ) -> Result<Conversation, AinaError> {
        let mut conversation = self.get(ctx, id).await?;
        conversations::assign(&self.db, id, agent.as_deref()).await?;
        info!(
            tenant_id = %conversation.tenant_id,
            conversation_id = %id,
            assigned_agent = agent.as_deref().unwrap_or("-"),
            "conversation assigned"
        );
        conversation.assigned_agent = agent;
        self.bus.publish(
            &conversation.tenant_id,
            RealtimeEvent::ConversationAssigned {
                conversation_id: conversation.id.clone(),
                assigned_agent: conversation.assigned_agent.clone(),
            },
        );
        Ok(conversation)
    }

    /// Purge a conversation and its messages. Ledger entries are kept.
    pub async fn delete(&self, ctx: &AuthContext, id: &ConversationId) -> Result<(), AinaError> {
        let conversation = self.get(ctx, id).await?;
        conversations::delete_conversation(&self.db, id).await?;
        info!(tenant_id = %conversation.tenant_id, conversation_id = %id, "conversation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send::testing::ScriptedProvider;
    use aina_core::{
        Credits, ManualClock, Platform, ProviderCredentials, Tenant, TenantId, TenantStatus,
    };
    use aina_storage::queries::tenants;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap()
    }

    async fn setup() -> (ConversationService, Arc<ManualClock>, Arc<EventBus>, Conversation) {
        let db = Database::open_in_memory().await.unwrap();
        for id in ["acme", "globex"] {
            tenants::create_tenant(
                &db,
                &Tenant {
                    id: TenantId::from(id),
                    name: id.into(),
                    status: TenantStatus::Active,
                    balance: Credits::ZERO,
                    plan: None,
                    credentials: ProviderCredentials::default(),
                    created_at: t0(),
                },
            )
            .await
            .unwrap();
        }
        let conversation = conversations::upsert_conversation(
            &db,
            &TenantId::from("acme"),
            Platform::WhatsApp,
            "+911",
            None,
            t0(),
        )
        .await
        .unwrap();
        conversations::record_inbound(&db, &conversation.id, t0())
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let bus = Arc::new(EventBus::new(16));
        let service = ConversationService::new(
            db,
            ProviderRegistry::new().with(Arc::new(ScriptedProvider::whatsapp())),
            bus.clone(),
            clock.clone(),
        );
        (service, clock, bus, conversation)
    }

    #[tokio::test]
    async fn session_state_follows_the_clock() {
        let (service, clock, _bus, conversation) = setup().await;
        let ctx = AuthContext::agent(TenantId::from("acme"), "priya");

        let view = service.session_state(&ctx, &conversation.id).await.unwrap();
        assert!(view.open);
        assert_eq!(view.closes_at, Some(t0() + chrono::Duration::hours(24)));

        clock.advance(chrono::Duration::hours(25));
        let view = service.session_state(&ctx, &conversation.id).await.unwrap();
        assert!(!view.open);
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_or_change_conversation() {
        let (service, _clock, _bus, conversation) = setup().await;
        let intruder = AuthContext::agent(TenantId::from("globex"), "mallory");

        assert!(matches!(
            service.messages(&intruder, &conversation.id, 10).await,
            Err(AinaError::TenantMismatch { .. })
        ));
        assert!(matches!(
            service.delete(&intruder, &conversation.id).await,
            Err(AinaError::TenantMismatch { .. })
        ));
        assert!(
            service
                .list(&intruder, ConversationFilter::All)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn assignment_is_published() {
        let (service, _clock, bus, conversation) = setup().await;
        let ctx = AuthContext::agent(TenantId::from("acme"), "priya");
        let mut events = bus.subscribe(&TenantId::from("acme"));

        let updated = service
            .assign(&ctx, &conversation.id, Some("priya".into()))
            .await
            .unwrap();
        assert_eq!(updated.assigned_agent.as_deref(), Some("priya"));
        let event = events.recv().await.unwrap();
        assert_eq!(event.event.event_type(), "conversation.assigned");

        let mine = service
            .list(&ctx, ConversationFilter::AssignedTo("priya".into()))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
    }
}
