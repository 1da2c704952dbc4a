// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion.
//!
//! The HTTP handler only enqueues the raw payload and acknowledges. A single
//! background worker parses each payload and handles its events in delivery
//! order: tenant resolution, conversation upsert, deduplicated insert, window
//! bump, automation matching, and fan-out. Matched auto-replies are handed to
//! [`AutoReplier`] lanes so provider latency never stalls ingestion.

use std::sync::Arc;

use aina_automation::match_rule;
use aina_bus::{EventBus, RealtimeEvent};
use aina_core::{
    AinaError, Clock, Direction, Message, MessageId, MessageStatus, Platform, StatusTransition,
};
use aina_provider::webhook::{InboundMessage, StatusUpdate, WebhookEvent, parse_payload};
use aina_storage::Database;
use aina_storage::queries::{automations, conversations, messages, tenants};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::replies::{AutoReplier, ReplyJob};
use crate::send::SendService;

/// A raw webhook body awaiting processing.
#[derive(Debug)]
pub struct WebhookJob {
    pub platform: Platform,
    pub body: Vec<u8>,
}

/// What happened to the events of one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inbound: usize,
    pub status_updates: usize,
    pub duplicates: usize,
    /// Auto-replies queued for dispatch.
    pub auto_replies: usize,
    pub dropped: usize,
}

enum Handled {
    Stored { auto_replied: bool },
    StatusApplied,
    Dropped,
}

/// Turns parsed webhook events into stored state and realtime events.
pub struct IngestPipeline {
    db: Database,
    send: SendService,
    replies: AutoReplier,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl IngestPipeline {
    pub fn new(db: Database, send: SendService, bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            replies: AutoReplier::new(send.clone()),
            send,
            bus,
            clock,
        }
    }

    /// The auto-reply lanes fed by this pipeline.
    pub fn replies(&self) -> &AutoReplier {
        &self.replies
    }

    /// Parse one payload and handle its events in order.
    ///
    /// Failures are logged per event; one bad event never stops the rest.
    pub async fn process_payload(&self, platform: Platform, body: &[u8]) -> IngestReport {
        let mut report = IngestReport::default();
        for event in parse_payload(platform, body) {
            #[cfg(feature = "prometheus")]
            aina_prometheus::record_webhook_event(&platform.to_string(), event.kind());

            let outcome = match event {
                WebhookEvent::InboundMessage(inbound) => self.handle_inbound(inbound).await,
                WebhookEvent::StatusUpdate(update) => self.handle_status(update).await,
                WebhookEvent::Unrecognized { reason } => {
                    debug!(platform = %platform, reason, "ignoring unrecognized webhook event");
                    Ok(Handled::Dropped)
                }
            };
            match outcome {
                Ok(Handled::Stored { auto_replied }) => {
                    report.inbound += 1;
                    if auto_replied {
                        report.auto_replies += 1;
                    }
                }
                Ok(Handled::StatusApplied) => report.status_updates += 1,
                Ok(Handled::Dropped) => report.dropped += 1,
                Err(AinaError::DuplicateWebhookEvent {
                    provider_message_id,
                }) => {
                    debug!(platform = %platform, provider_message_id, "skipping redelivered message");
                    #[cfg(feature = "prometheus")]
                    aina_prometheus::record_duplicate_delivery(&platform.to_string());
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!(platform = %platform, error = %e, "webhook event handling failed");
                    report.dropped += 1;
                }
            }
        }
        report
    }

    async fn handle_inbound(&self, inbound: InboundMessage) -> Result<Handled, AinaError> {
        let Some(tenant) =
            tenants::find_by_account(&self.db, inbound.platform, &inbound.account_id).await?
        else {
            warn!(
                platform = %inbound.platform,
                account_id = inbound.account_id,
                "inbound message for unknown account dropped"
            );
            return Ok(Handled::Dropped);
        };

        let now = self.clock.now();
        // Provider timestamps ahead of our clock are clamped so skew cannot
        // stretch the session window.
        let received_at = inbound.timestamp.min(now);
        let conversation = conversations::upsert_conversation(
            &self.db,
            &tenant.id,
            inbound.platform,
            &inbound.contact_id,
            inbound.contact_name.as_deref(),
            received_at,
        )
        .await?;

        let message = Message {
            id: MessageId::generate(),
            conversation_id: conversation.id.clone(),
            tenant_id: tenant.id.clone(),
            platform: inbound.platform,
            direction: Direction::Inbound,
            kind: inbound.kind,
            body: inbound.body.clone(),
            media_ref: inbound.media_ref.clone(),
            status: MessageStatus::Delivered,
            provider_message_id: Some(inbound.provider_message_id.clone()),
            cost: aina_core::Credits::ZERO,
            charge_entry_id: None,
            error: None,
            created_at: received_at,
            updated_at: now,
        };
        if !messages::insert_inbound(&self.db, &message).await? {
            return Err(AinaError::DuplicateWebhookEvent {
                provider_message_id: inbound.provider_message_id,
            });
        }
        conversations::record_inbound(&self.db, &conversation.id, received_at).await?;
        info!(
            tenant_id = %tenant.id,
            conversation_id = %conversation.id,
            message_id = %message.id,
            kind = %message.kind,
            "inbound message stored"
        );
        self.bus.publish(
            &tenant.id,
            RealtimeEvent::MessageCreated {
                message: message.clone(),
            },
        );

        let auto_replied = self.auto_reply(&message).await;
        Ok(Handled::Stored { auto_replied })
    }

    /// Queue the first matching rule's response. Any failure degrades to no reply.
    async fn auto_reply(&self, inbound: &Message) -> bool {
        if inbound.body.trim().is_empty() {
            return false;
        }
        let rules = match automations::list_rules(&self.db, &inbound.tenant_id, true).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(tenant_id = %inbound.tenant_id, error = %e, "could not load automation rules");
                return false;
            }
        };
        let Some(rule) = match_rule(&inbound.body, &rules) else {
            return false;
        };
        debug!(tenant_id = %inbound.tenant_id, rule_id = %rule.id, "automation rule matched");
        self.replies.schedule(ReplyJob {
            inbound: inbound.clone(),
            rule: rule.clone(),
        })
    }

    async fn handle_status(&self, update: StatusUpdate) -> Result<Handled, AinaError> {
        let Some(message) =
            messages::find_by_provider_id(&self.db, update.platform, &update.provider_message_id)
                .await?
        else {
            debug!(
                platform = %update.platform,
                provider_message_id = update.provider_message_id,
                "status update for unknown message dropped"
            );
            return Ok(Handled::Dropped);
        };

        // The callback must come from the account that owns the message.
        let owner = tenants::find_by_account(&self.db, update.platform, &update.account_id).await?;
        if owner.as_ref().map(|t| &t.id) != Some(&message.tenant_id) {
            warn!(
                platform = %update.platform,
                account_id = update.account_id,
                message_id = %message.id,
                "status update from foreign account dropped"
            );
            return Ok(Handled::Dropped);
        }

        let transition = messages::advance_status(
            &self.db,
            &message.id,
            update.status,
            update.error.as_deref(),
            self.clock.now(),
        )
        .await?;
        match transition {
            StatusTransition::Advanced => {
                debug!(
                    message_id = %message.id,
                    from = %message.status,
                    to = %update.status,
                    "message status advanced"
                );
                if update.status == MessageStatus::Failed {
                    self.send.refund_failed_delivery(&message).await;
                }
                self.bus.publish(
                    &message.tenant_id,
                    RealtimeEvent::MessageStatusChanged {
                        message_id: message.id.clone(),
                        conversation_id: message.conversation_id.clone(),
                        status: update.status,
                        error: update.error,
                    },
                );
                Ok(Handled::StatusApplied)
            }
            StatusTransition::Unchanged => Ok(Handled::StatusApplied),
            StatusTransition::Rejected => {
                warn!(
                    message_id = %message.id,
                    current = %message.status,
                    requested = %update.status,
                    "out-of-order status update dropped"
                );
                Ok(Handled::Dropped)
            }
        }
    }
}

/// Handle for enqueueing webhook payloads onto the ingest worker.
#[derive(Clone)]
pub struct Ingestor {
    tx: mpsc::Sender<WebhookJob>,
}

impl Ingestor {
    /// Start the worker. It stops taking new work when `cancel` fires,
    /// finishes the payloads already queued and waits for their auto-replies
    /// before exiting.
    pub fn spawn(
        pipeline: Arc<IngestPipeline>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(pipeline, rx, cancel));
        (Self { tx }, worker)
    }

    /// Payloads queued and not yet picked up by the worker.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Queue a payload without waiting. Returns `false` if it was dropped
    /// because the queue is full or the worker has stopped.
    pub fn enqueue(&self, platform: Platform, body: Vec<u8>) -> bool {
        match self.tx.try_send(WebhookJob { platform, body }) {
            Ok(()) => {
                #[cfg(feature = "prometheus")]
                aina_prometheus::set_ingest_queue_depth(self.queue_depth());
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(platform = %job.platform, bytes = job.body.len(), "ingest queue full; payload dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(platform = %job.platform, "ingest worker stopped; payload dropped");
                false
            }
        }
    }
}

async fn run_worker(
    pipeline: Arc<IngestPipeline>,
    mut rx: mpsc::Receiver<WebhookJob>,
    cancel: CancellationToken,
) {
    info!("ingest worker started");
    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    #[cfg(feature = "prometheus")]
                    aina_prometheus::set_ingest_queue_depth(rx.len());
                    process(&pipeline, job).await
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                rx.close();
                let mut drained = 0usize;
                while let Some(job) = rx.recv().await {
                    process(&pipeline, job).await;
                    drained += 1;
                }
                info!(drained, "ingest queue drained");
                break;
            }
        }
    }
    #[cfg(feature = "prometheus")]
    aina_prometheus::set_ingest_queue_depth(0);
    pipeline.replies.close().await;
    info!("ingest worker stopped");
}

async fn process(pipeline: &IngestPipeline, job: WebhookJob) {
    let report = pipeline.process_payload(job.platform, &job.body).await;
    debug!(platform = %job.platform, ?report, "webhook payload processed");
}
