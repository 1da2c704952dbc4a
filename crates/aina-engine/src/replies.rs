// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-reply dispatch, off the ingest worker.
//!
//! Every tenant gets its own lane: a bounded queue drained by one task, so
//! replies for a conversation go out in the order their inbound messages were
//! stored while a slow provider only ever delays its own tenant. A reply that
//! cannot be queued is dropped; the inbound message is already stored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use aina_core::{AuthContext, AutomationRule, Message, MessageStatus, TenantId};
use dashmap::DashMap;
use tokio::sync::{Notify, mpsc};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::send::{SendRequest, SendService};

/// Replies waiting per tenant before new ones are dropped.
pub const LANE_CAPACITY: usize = 256;

/// One matched rule awaiting dispatch.
#[derive(Debug, Clone)]
pub struct ReplyJob {
    pub inbound: Message,
    pub rule: AutomationRule,
}

/// Counts queued plus in-flight replies so callers can wait for quiescence.
#[derive(Default)]
struct Progress {
    pending: AtomicUsize,
    idle: Notify,
}

impl Progress {
    fn begin(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Schedules auto-replies through the regular send path.
#[derive(Clone)]
pub struct AutoReplier {
    inner: Arc<ReplierInner>,
}

struct ReplierInner {
    send: SendService,
    lanes: DashMap<TenantId, mpsc::Sender<ReplyJob>>,
    progress: Arc<Progress>,
    tracker: TaskTracker,
    closed: AtomicBool,
}

impl AutoReplier {
    pub fn new(send: SendService) -> Self {
        Self {
            inner: Arc::new(ReplierInner {
                send,
                lanes: DashMap::new(),
                progress: Arc::new(Progress::default()),
                tracker: TaskTracker::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a reply on the tenant's lane. Returns `false` if it was dropped.
    pub fn schedule(&self, job: ReplyJob) -> bool {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            warn!(tenant_id = %job.inbound.tenant_id, "auto-replies stopped; reply dropped");
            return false;
        }
        let tenant_id = job.inbound.tenant_id.clone();
        let lane = inner
            .lanes
            .entry(tenant_id.clone())
            .or_insert_with(|| self.open_lane(&tenant_id))
            .clone();

        inner.progress.begin();
        match lane.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                inner.progress.finish();
                warn!(
                    tenant_id = %tenant_id,
                    rule_id = %job.rule.id,
                    "auto-reply lane full; reply dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                inner.progress.finish();
                warn!(tenant_id = %tenant_id, rule_id = %job.rule.id, "auto-reply lane closed; reply dropped");
                false
            }
        }
    }

    fn open_lane(&self, tenant_id: &TenantId) -> mpsc::Sender<ReplyJob> {
        let (tx, rx) = mpsc::channel(LANE_CAPACITY);
        debug!(tenant_id = %tenant_id, "opening auto-reply lane");
        self.inner.tracker.spawn(run_lane(
            self.inner.send.clone(),
            Arc::clone(&self.inner.progress),
            rx,
        ));
        tx
    }

    /// Resolves once every scheduled reply has been dispatched or dropped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.progress.idle.notified();
            if self.inner.progress.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting replies and wait for the queued ones to finish.
    pub async fn close(&self) {
        let inner = &self.inner;
        inner.closed.store(true, Ordering::SeqCst);
        let lanes = inner.lanes.len();
        inner.lanes.clear();
        inner.tracker.close();
        inner.tracker.wait().await;
        info!(lanes, "auto-reply lanes drained");
    }
}

async fn run_lane(send: SendService, progress: Arc<Progress>, mut rx: mpsc::Receiver<ReplyJob>) {
    while let Some(job) = rx.recv().await {
        dispatch(&send, job).await;
        progress.finish();
    }
}

/// Send one reply. Every failure degrades to no reply.
async fn dispatch(send: &SendService, job: ReplyJob) {
    let ReplyJob { inbound, rule } = job;
    let ctx = AuthContext::system(inbound.tenant_id.clone());
    let request = SendRequest::text(inbound.conversation_id.clone(), rule.response.clone());
    match send.send(&ctx, request).await {
        Ok(reply) if reply.status != MessageStatus::Failed => {
            info!(
                tenant_id = %inbound.tenant_id,
                rule_id = %rule.id,
                message_id = %reply.id,
                "auto-reply sent"
            );
        }
        Ok(reply) => {
            warn!(
                tenant_id = %inbound.tenant_id,
                rule_id = %rule.id,
                error = reply.error.as_deref().unwrap_or("-"),
                "auto-reply dispatch failed"
            );
        }
        Err(e) => {
            warn!(
                tenant_id = %inbound.tenant_id,
                rule_id = %rule.id,
                error = %e,
                "auto-reply skipped"
            );
        }
    }
}
