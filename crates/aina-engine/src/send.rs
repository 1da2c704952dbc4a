// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound send path: window check, atomic debit, dispatch, compensation.
//!
//! Validation runs in the caller's future. From the debit onward the work runs
//! in a spawned task, so a caller that goes away after being charged cannot
//! leave the charge without either a dispatched message or a refund.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aina_bus::{EventBus, RealtimeEvent};
use aina_config::model::{DispatchConfig, TimeoutPolicy};
use aina_core::{
    AinaError, AuthContext, Clock, Conversation, ConversationId, Credits, Direction,
    DispatchError, LedgerEntry, Message, MessageId, MessageKind, MessageStatus,
    MessagingProvider, OutboundRequest, ProviderCredentials, ProviderReceipt, StatusTransition,
};
use aina_ledger::{CreditLedger, PriceTable};
use aina_storage::Database;
use aina_storage::queries::{conversations, messages, tenants};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::providers::ProviderRegistry;
use crate::window;

/// Longest accepted message body.
pub const MAX_BODY_CHARS: usize = 4096;

/// Attempts at writing a refund before the message is left for reconciliation.
const REFUND_ATTEMPTS: u32 = 3;

/// A tenant's request to send one message into a conversation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendRequest {
    pub conversation_id: ConversationId,
    pub kind: MessageKind,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub media_ref: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub template_language: Option<String>,
}

impl SendRequest {
    pub fn text(conversation_id: ConversationId, body: impl Into<String>) -> Self {
        Self {
            conversation_id,
            kind: MessageKind::Text,
            body: body.into(),
            media_ref: None,
            template_name: None,
            template_language: None,
        }
    }

    pub fn template(conversation_id: ConversationId, name: impl Into<String>) -> Self {
        Self {
            conversation_id,
            kind: MessageKind::Template,
            body: String::new(),
            media_ref: None,
            template_name: Some(name.into()),
            template_language: None,
        }
    }

    fn validate(&self) -> Result<(), AinaError> {
        if self.body.chars().count() > MAX_BODY_CHARS {
            return Err(AinaError::Validation(format!(
                "message body exceeds {MAX_BODY_CHARS} characters"
            )));
        }
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        match self.kind {
            MessageKind::Text | MessageKind::Interactive if self.body.trim().is_empty() => Err(
                AinaError::Validation(format!("{} messages need a body", self.kind)),
            ),
            MessageKind::Template if blank(&self.template_name) => Err(AinaError::Validation(
                "template messages need a template name".to_string(),
            )),
            MessageKind::Media if blank(&self.media_ref) => Err(AinaError::Validation(
                "media messages need a media reference".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Admin resolution of a message held after an ambiguous dispatch timeout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ReconcileOutcome {
    /// The provider did accept the message.
    Sent { provider_message_id: String },
    /// The message never went out; refund the charge.
    Failed { reason: String },
}

/// Everything the debit-and-dispatch task needs, gathered during validation.
struct PreparedSend {
    conversation: Conversation,
    credentials: ProviderCredentials,
    provider: Arc<dyn MessagingProvider>,
    request: SendRequest,
    cost: Credits,
}

/// The credit enforcement service in front of every outbound message.
#[derive(Clone)]
pub struct SendService {
    inner: Arc<SendInner>,
}

struct SendInner {
    db: Database,
    ledger: CreditLedger,
    providers: ProviderRegistry,
    prices: PriceTable,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    dispatch: DispatchConfig,
}

impl SendService {
    pub fn new(
        ledger: CreditLedger,
        providers: ProviderRegistry,
        prices: PriceTable,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SendInner {
                db: ledger.database().clone(),
                ledger,
                providers,
                prices,
                bus,
                clock,
                dispatch,
            }),
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.inner.providers
    }

    pub fn prices(&self) -> &PriceTable {
        &self.inner.prices
    }

    /// Send one message on behalf of `ctx`.
    ///
    /// Window, tenant status and balance violations are returned as errors and
    /// nothing is charged or dispatched. Once charged, a provider failure is
    /// not an error: the charge is refunded and the FAILED message is returned
    /// with the provider's error text attached.
    pub async fn send(&self, ctx: &AuthContext, request: SendRequest) -> Result<Message, AinaError> {
        let prepared = self.inner.prepare(ctx, request).await?;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.execute(prepared).await })
            .await
            .map_err(|e| AinaError::Internal(format!("send task failed: {e}")))?
    }

    /// Resolve a message left QUEUED by a held dispatch timeout.
    pub async fn reconcile(
        &self,
        ctx: &AuthContext,
        message_id: &MessageId,
        outcome: ReconcileOutcome,
    ) -> Result<Message, AinaError> {
        ctx.require_admin()?;
        let inner = &self.inner;
        let message = messages::get_message(&inner.db, message_id)
            .await?
            .ok_or_else(|| AinaError::not_found("message", message_id.as_str()))?;
        // A FAILED message may only be re-driven to retry its refund.
        let reconcilable = match (&outcome, message.status) {
            (_, MessageStatus::Queued) => true,
            (ReconcileOutcome::Failed { .. }, MessageStatus::Failed) => {
                message.charge_entry_id.is_some()
            }
            _ => false,
        };
        if message.direction != Direction::Outbound || !reconcilable {
            return Err(AinaError::Validation(format!(
                "message {message_id} is {} and cannot be reconciled",
                message.status
            )));
        }
        info!(
            message_id = %message_id,
            actor_id = ctx.actor_id.as_deref().unwrap_or("-"),
            outcome = ?outcome,
            "reconciling held message"
        );
        match outcome {
            ReconcileOutcome::Sent {
                provider_message_id,
            } => {
                inner
                    .complete(
                        message,
                        ProviderReceipt {
                            provider_message_id,
                        },
                    )
                    .await
            }
            ReconcileOutcome::Failed { reason } => inner.fail(message, &reason).await,
        }
    }

    /// Refund the charge behind an outbound message the provider later
    /// reported as failed. Refunds are idempotent per charge.
    ///
    /// If the refund cannot be written the message stays FAILED with its
    /// charge outstanding; an admin `reconcile` with a failed outcome retries it.
    pub async fn refund_failed_delivery(&self, message: &Message) -> Option<LedgerEntry> {
        let charge_id = message.charge_entry_id.as_ref()?;
        let refund = self
            .inner
            .compensate(charge_id, "provider reported delivery failure")
            .await
            .ok()?;
        self.inner
            .bus
            .publish(&message.tenant_id, RealtimeEvent::balance_changed(&refund));
        Some(refund)
    }
}

impl SendInner {
    async fn prepare(&self, ctx: &AuthContext, request: SendRequest) -> Result<PreparedSend, AinaError> {
        request.validate()?;
        let conversation = conversations::get_conversation(&self.db, &request.conversation_id)
            .await?
            .ok_or_else(|| {
                AinaError::not_found("conversation", request.conversation_id.as_str())
            })?;
        ctx.authorize_tenant(&conversation.tenant_id)?;

        let provider = self.providers.get(conversation.platform)?;
        if request.kind.is_free_form() {
            let state = window::evaluate(
                conversation.last_inbound_at,
                provider.capabilities().session_window,
                self.clock.now(),
            );
            if !state.is_open() {
                debug!(
                    conversation_id = %conversation.id,
                    kind = %request.kind,
                    "free-form send outside session window"
                );
                return Err(AinaError::SessionWindowClosed {
                    conversation_id: conversation.id.to_string(),
                });
            }
        }

        let tenant = tenants::get_tenant(&self.db, &conversation.tenant_id)
            .await?
            .ok_or_else(|| AinaError::not_found("tenant", conversation.tenant_id.as_str()))?;
        let cost = self.prices.cost_of(request.kind);
        Ok(PreparedSend {
            conversation,
            credentials: tenant.credentials,
            provider,
            request,
            cost,
        })
    }

    async fn execute(&self, prepared: PreparedSend) -> Result<Message, AinaError> {
        let PreparedSend {
            conversation,
            credentials,
            provider,
            request,
            cost,
        } = prepared;
        let tenant_id = conversation.tenant_id.clone();

        let charge = self
            .ledger
            .charge_for_send(
                &tenant_id,
                cost,
                &format!("{} message to {}", request.kind, conversation.contact_id),
            )
            .await?;
        self.bus
            .publish(&tenant_id, RealtimeEvent::balance_changed(&charge));

        let now = self.clock.now();
        let message = Message {
            id: MessageId::generate(),
            conversation_id: conversation.id.clone(),
            tenant_id: tenant_id.clone(),
            platform: conversation.platform,
            direction: Direction::Outbound,
            kind: request.kind,
            body: request.body.clone(),
            media_ref: request.media_ref.clone(),
            status: MessageStatus::Queued,
            provider_message_id: None,
            cost,
            charge_entry_id: Some(charge.id.clone()),
            error: None,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = messages::insert_message(&self.db, &message).await {
            error!(tenant_id = %tenant_id, error = %e, "failed to record outbound message");
            if let Ok(refund) = self
                .compensate(&charge.id, "outbound message could not be recorded")
                .await
            {
                self.bus
                    .publish(&tenant_id, RealtimeEvent::balance_changed(&refund));
            }
            return Err(e);
        }
        self.bus.publish(
            &tenant_id,
            RealtimeEvent::MessageCreated {
                message: message.clone(),
            },
        );

        let outbound = OutboundRequest {
            recipient: conversation.contact_id.clone(),
            kind: request.kind,
            body: request.body,
            media_ref: request.media_ref,
            template_name: request.template_name,
            template_language: request.template_language,
        };
        let started = Instant::now();
        let outcome = self.dispatch(provider.as_ref(), &credentials, &outbound).await;
        #[cfg(feature = "prometheus")]
        aina_prometheus::record_dispatch_latency(
            &conversation.platform.to_string(),
            started.elapsed().as_secs_f64(),
        );

        match outcome {
            Ok(receipt) => {
                debug!(
                    message_id = %message.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "provider accepted message"
                );
                self.complete(message, receipt).await
            }
            Err(DispatchError::Timeout) if self.dispatch.on_timeout == TimeoutPolicy::Hold => {
                warn!(
                    tenant_id = %tenant_id,
                    message_id = %message.id,
                    charge_id = %charge.id,
                    "dispatch timed out; charge held for reconciliation"
                );
                #[cfg(feature = "prometheus")]
                aina_prometheus::record_send(&conversation.platform.to_string(), "held");
                Ok(message)
            }
            Err(e) => {
                let reason = match &e {
                    DispatchError::Rejected { message } | DispatchError::Transient { message } => {
                        message.clone()
                    }
                    DispatchError::Timeout => "dispatch timed out".to_string(),
                };
                let failure = AinaError::ProviderDispatchFailed {
                    message: reason.clone(),
                    retryable: e.is_transient(),
                };
                warn!(
                    tenant_id = %tenant_id,
                    message_id = %message.id,
                    error = %failure,
                    "dispatch failed; refunding"
                );
                self.fail(message, &reason).await
            }
        }
    }

    /// One dispatch bounded by the overall deadline, retrying transient failures.
    async fn dispatch(
        &self,
        provider: &dyn MessagingProvider,
        credentials: &ProviderCredentials,
        request: &OutboundRequest,
    ) -> Result<ProviderReceipt, DispatchError> {
        let deadline = Duration::from_secs(self.dispatch.timeout_secs);
        let attempts = async {
            let mut attempt: u32 = 0;
            loop {
                match provider.send(credentials, request).await {
                    Err(e) if e.is_transient() && attempt < self.dispatch.max_retries => {
                        let backoff = Duration::from_millis(
                            self.dispatch
                                .retry_backoff_ms
                                .saturating_mul(1u64 << attempt.min(6)),
                        );
                        debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "retrying dispatch");
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    other => return other,
                }
            }
        };
        match tokio::time::timeout(deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout),
        }
    }

    /// Record provider acceptance and move the message to SENT.
    async fn complete(
        &self,
        mut message: Message,
        receipt: ProviderReceipt,
    ) -> Result<Message, AinaError> {
        let now = self.clock.now();
        let transition =
            messages::mark_sent(&self.db, &message.id, &receipt.provider_message_id, now).await?;
        conversations::touch(&self.db, &message.conversation_id, now).await?;
        message.provider_message_id = Some(receipt.provider_message_id);
        #[cfg(feature = "prometheus")]
        aina_prometheus::record_send(&message.platform.to_string(), "sent");

        if transition == StatusTransition::Advanced {
            message.status = MessageStatus::Sent;
            message.updated_at = now;
            self.publish_status(&message);
        } else if let Some(current) = messages::get_message(&self.db, &message.id).await? {
            // A status callback overtook the send acknowledgement.
            message = current;
        }
        info!(
            tenant_id = %message.tenant_id,
            message_id = %message.id,
            status = %message.status,
            "message sent"
        );
        Ok(message)
    }

    /// Refund the charge and mark the message FAILED with `reason`.
    ///
    /// The refund is written first. If it cannot be written the message is
    /// left QUEUED and the error returned, so `reconcile` can finish the job.
    async fn fail(&self, mut message: Message, reason: &str) -> Result<Message, AinaError> {
        if let Some(charge_id) = message.charge_entry_id.clone() {
            let refund = self.compensate(&charge_id, reason).await.map_err(|e| {
                error!(
                    tenant_id = %message.tenant_id,
                    message_id = %message.id,
                    charge_id = %charge_id,
                    error = %e,
                    "refund outstanding; message left queued for reconciliation"
                );
                e
            })?;
            self.bus
                .publish(&message.tenant_id, RealtimeEvent::balance_changed(&refund));
        }
        let now = self.clock.now();
        let transition = messages::advance_status(
            &self.db,
            &message.id,
            MessageStatus::Failed,
            Some(reason),
            now,
        )
        .await?;
        #[cfg(feature = "prometheus")]
        aina_prometheus::record_send(&message.platform.to_string(), "failed");
        if transition == StatusTransition::Advanced {
            message.status = MessageStatus::Failed;
            message.error = Some(reason.to_string());
            message.updated_at = now;
            self.publish_status(&message);
        }
        Ok(message)
    }

    /// Write the refund for `charge_id`, retrying storage failures.
    ///
    /// Refunds are keyed on the charge, so a retry after an ambiguous failure
    /// returns the entry already written instead of refunding twice.
    async fn compensate(
        &self,
        charge_id: &aina_core::EntryId,
        reason: &str,
    ) -> Result<LedgerEntry, AinaError> {
        let mut attempt: u32 = 1;
        loop {
            match self.ledger.refund(charge_id, reason).await {
                Ok(refund) => {
                    #[cfg(feature = "prometheus")]
                    aina_prometheus::record_refund();
                    return Ok(refund);
                }
                Err(e @ AinaError::Storage { .. }) if attempt < REFUND_ATTEMPTS => {
                    warn!(charge_id = %charge_id, attempt, error = %e, "refund failed; retrying");
                    let backoff = self
                        .dispatch
                        .retry_backoff_ms
                        .saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(charge_id = %charge_id, attempt, error = %e, "refund failed");
                    return Err(e);
                }
            }
        }
    }

    fn publish_status(&self, message: &Message) {
        self.bus.publish(
            &message.tenant_id,
            RealtimeEvent::MessageStatusChanged {
                message_id: message.id.clone(),
                conversation_id: message.conversation_id.clone(),
                status: message.status,
                error: message.error.clone(),
            },
        );
    }
}
