// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant credit ledger with atomic debit enforcement.
//!
//! Every balance change is one SQLite transaction executed on the storage
//! crate's single connection thread: read status and cached balance, check,
//! append the entry, update the cached balance, commit. Because all database
//! work funnels through that thread, a check can never interleave with
//! another tenant operation, and `balance == SUM(entries)` holds after every
//! commit.

use std::sync::Arc;

use aina_core::{
    AinaError, AuthContext, Clock, Credits, EntryId, LedgerEntry, LedgerKind, OrderStatus,
    TenantId, TenantStatus,
};
use aina_storage::Database;
use aina_storage::database::map_tr_err;
use aina_storage::queries::{ledger as entries, messages, orders, tenants};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// One balance change to apply.
struct Posting {
    tenant_id: String,
    amount: Credits,
    kind: LedgerKind,
    description: String,
    actor_id: Option<String>,
    reference: Option<String>,
    /// Reject with `TenantSuspended` unless the tenant is ACTIVE.
    require_active: bool,
}

/// Result of comparing the cached balance with the ledger sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub tenant_id: TenantId,
    pub cached: Credits,
    pub computed: Credits,
    pub consistent: bool,
}

/// Usage aggregates derived from the ledger and message log at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub tenant_id: TenantId,
    pub balance: Credits,
    pub purchased: Credits,
    pub admin_credited: Credits,
    pub admin_debited: Credits,
    pub charged: Credits,
    pub refunded: Credits,
    /// Charged minus refunded.
    pub net_spend: Credits,
    pub messages_charged: i64,
    pub refunds: i64,
    pub inbound_messages: i64,
    pub outbound_messages: i64,
    pub failed_messages: i64,
}

/// Append-only credit ledger backed by SQLite.
#[derive(Clone)]
pub struct CreditLedger {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl CreditLedger {
    /// Create a ledger sharing the given database handle.
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Debit `cost` for an outbound message, atomically.
    ///
    /// Fails with `TenantSuspended` if the tenant is not ACTIVE (checked before
    /// the balance), or `InsufficientCredit` if the balance does not cover the
    /// cost. Nothing is written on failure.
    pub async fn charge_for_send(
        &self,
        tenant_id: &TenantId,
        cost: Credits,
        description: &str,
    ) -> Result<LedgerEntry, AinaError> {
        if !cost.is_positive() {
            return Err(AinaError::InvalidAmount(format!(
                "message cost must be positive, got {cost}"
            )));
        }
        let amount = cost.checked_neg().ok_or_else(|| {
            AinaError::InvalidAmount(format!("message cost out of range: {cost}"))
        })?;
        let entry = self
            .post(Posting {
                tenant_id: tenant_id.0.clone(),
                amount,
                kind: LedgerKind::MessageCharge,
                description: description.to_string(),
                actor_id: None,
                reference: None,
                require_active: true,
            })
            .await?;

        info!(
            tenant_id = %tenant_id,
            entry_id = %entry.id,
            cost = %cost,
            balance_after = %entry.balance_after,
            "message charged"
        );
        Ok(entry)
    }

    /// Admin balance adjustment.
    ///
    /// Positive amounts append `ADMIN_CREDIT`; negative amounts append
    /// `ADMIN_DEBIT` and are rejected if they would take the balance below zero.
    pub async fn adjust_balance(
        &self,
        ctx: &AuthContext,
        tenant_id: &TenantId,
        amount: Credits,
        reason: &str,
    ) -> Result<LedgerEntry, AinaError> {
        ctx.require_admin()?;
        if amount == Credits::ZERO {
            return Err(AinaError::InvalidAmount(
                "adjustment amount must not be zero".to_string(),
            ));
        }
        let kind = if amount.is_positive() {
            LedgerKind::AdminCredit
        } else {
            LedgerKind::AdminDebit
        };
        let actor_id = ctx
            .actor_id
            .clone()
            .ok_or_else(|| AinaError::Forbidden("adjustments require an actor".to_string()))?;
        let entry = self
            .post(Posting {
                tenant_id: tenant_id.0.clone(),
                amount,
                kind,
                description: reason.to_string(),
                actor_id: Some(actor_id.clone()),
                reference: None,
                require_active: false,
            })
            .await?;

        info!(
            tenant_id = %tenant_id,
            actor_id = %actor_id,
            amount = %amount,
            kind = %kind,
            balance_after = %entry.balance_after,
            "balance adjusted"
        );
        Ok(entry)
    }

    /// Credit a completed purchase. Idempotent on `order_id`: a repeated call
    /// returns the entry created by the first one.
    pub async fn credit_purchase(
        &self,
        tenant_id: &TenantId,
        order_id: &str,
        credits: Credits,
    ) -> Result<LedgerEntry, AinaError> {
        if !credits.is_positive() {
            return Err(AinaError::InvalidAmount(format!(
                "purchase amount must be positive, got {credits}"
            )));
        }
        let entry = self
            .post(Posting {
                tenant_id: tenant_id.0.clone(),
                amount: credits,
                kind: LedgerKind::Purchase,
                description: format!("credit purchase {order_id}"),
                actor_id: None,
                reference: Some(order_id.to_string()),
                require_active: false,
            })
            .await?;
        info!(tenant_id = %tenant_id, order_id, credits = %credits, "purchase credited");
        Ok(entry)
    }

    /// Settle a stored payment order: mark it PAID and credit its pack in
    /// one transaction. Repeat confirmations return the original entry.
    pub async fn confirm_order(&self, order_id: &str) -> Result<LedgerEntry, AinaError> {
        let order_id = order_id.to_string();
        let now = self.clock.now();
        let entry = self
            .db
            .connection()
            .call(move |conn| -> Result<Result<LedgerEntry, AinaError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(order) = orders::find_order(&tx, &order_id)? else {
                    return Ok(Err(AinaError::not_found("payment order", order_id)));
                };
                if order.status == OrderStatus::Failed {
                    return Ok(Err(AinaError::Validation(format!(
                        "payment order {order_id} has failed"
                    ))));
                }
                let posting = Posting {
                    tenant_id: order.tenant_id.0.clone(),
                    amount: order.credits,
                    kind: LedgerKind::Purchase,
                    description: format!("credit pack {} ({order_id})", order.pack_id),
                    actor_id: None,
                    reference: Some(order_id.clone()),
                    require_active: false,
                };
                let entry = match post_in_tx(&tx, posting, now)? {
                    Ok(entry) => entry,
                    Err(e) => return Ok(Err(e)),
                };
                orders::write_status(&tx, &order_id, OrderStatus::Paid)?;
                tx.commit()?;
                Ok(Ok(entry))
            })
            .await
            .map_err(map_tr_err)??;
        info!(tenant_id = %entry.tenant_id, entry_id = %entry.id, "payment order settled");
        Ok(entry)
    }

    /// Compensate a message charge with a `REFUND` of the same magnitude.
    ///
    /// A charge is refunded at most once; repeated calls return the first refund.
    pub async fn refund(
        &self,
        charge_entry_id: &EntryId,
        reason: &str,
    ) -> Result<LedgerEntry, AinaError> {
        let charge_id = charge_entry_id.0.clone();
        let reason = reason.to_string();
        let now = self.clock.now();
        let entry = self
            .db
            .connection()
            .call(move |conn| -> Result<Result<LedgerEntry, AinaError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(charge) = entries::find_entry(&tx, &charge_id)? else {
                    return Ok(Err(AinaError::not_found("ledger entry", charge_id)));
                };
                if charge.kind != LedgerKind::MessageCharge {
                    return Ok(Err(AinaError::InvalidAmount(format!(
                        "entry {charge_id} is a {} and cannot be refunded",
                        charge.kind
                    ))));
                }
                let posting = Posting {
                    tenant_id: charge.tenant_id.0.clone(),
                    amount: charge.amount.abs(),
                    kind: LedgerKind::Refund,
                    description: reason,
                    actor_id: None,
                    reference: Some(charge_id),
                    require_active: false,
                };
                let result = post_in_tx(&tx, posting, now)?;
                if result.is_ok() {
                    tx.commit()?;
                }
                Ok(result)
            })
            .await
            .map_err(map_tr_err)??;
        info!(
            tenant_id = %entry.tenant_id,
            refund_id = %entry.id,
            charge_id = %charge_entry_id,
            amount = %entry.amount,
            "charge refunded"
        );
        Ok(entry)
    }

    /// The tenant's cached balance.
    pub async fn balance(&self, tenant_id: &TenantId) -> Result<Credits, AinaError> {
        let tenant = tenants::get_tenant(&self.db, tenant_id)
            .await?
            .ok_or_else(|| AinaError::not_found("tenant", tenant_id.as_str()))?;
        Ok(tenant.balance)
    }

    /// The tenant's most recent ledger entries, newest first.
    pub async fn entries(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, AinaError> {
        entries::list_entries(&self.db, tenant_id, limit).await
    }

    /// Audit: compare the cached balance with the sum of the tenant's entries.
    pub async fn verify(&self, tenant_id: &TenantId) -> Result<Reconciliation, AinaError> {
        let (cached, computed) = entries::balance_snapshot(&self.db, tenant_id)
            .await?
            .ok_or_else(|| AinaError::not_found("tenant", tenant_id.as_str()))?;
        let consistent = cached == computed;
        if !consistent {
            warn!(
                tenant_id = %tenant_id,
                cached = %cached,
                computed = %computed,
                "ledger balance mismatch"
            );
        }
        Ok(Reconciliation {
            tenant_id: tenant_id.clone(),
            cached,
            computed,
            consistent,
        })
    }

    /// Aggregate usage, derived from the ledger and message log.
    pub async fn usage_summary(&self, tenant_id: &TenantId) -> Result<UsageSummary, AinaError> {
        let balance = self.balance(tenant_id).await?;
        let totals = entries::totals_by_kind(&self.db, tenant_id).await?;
        let counts = messages::count_messages(&self.db, tenant_id).await?;
        let net_spend = totals
            .charged
            .checked_sub(totals.refunded)
            .ok_or_else(|| AinaError::Internal("credit arithmetic overflow".to_string()))?;
        Ok(UsageSummary {
            tenant_id: tenant_id.clone(),
            balance,
            purchased: totals.purchased,
            admin_credited: totals.admin_credited,
            admin_debited: totals.admin_debited,
            charged: totals.charged,
            refunded: totals.refunded,
            net_spend,
            messages_charged: totals.charge_count,
            refunds: totals.refund_count,
            inbound_messages: counts.inbound,
            outbound_messages: counts.outbound,
            failed_messages: counts.failed,
        })
    }

    async fn post(&self, posting: Posting) -> Result<LedgerEntry, AinaError> {
        let now = self.clock.now();
        self.db
            .connection()
            .call(move |conn| -> Result<Result<LedgerEntry, AinaError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let result = post_in_tx(&tx, posting, now)?;
                if result.is_ok() {
                    tx.commit()?;
                }
                Ok(result)
            })
            .await
            .map_err(map_tr_err)?
    }
}

/// Check and append one posting inside an open transaction.
///
/// The outer `Result` carries SQLite failures; the inner one carries domain
/// rejections, for which nothing has been written.
fn post_in_tx(
    tx: &rusqlite::Transaction<'_>,
    posting: Posting,
    now: DateTime<Utc>,
) -> rusqlite::Result<Result<LedgerEntry, AinaError>> {
    if let Some(reference) = &posting.reference
        && let Some(existing) = entries::find_by_reference(tx, &posting.tenant_id, posting.kind, reference)?
    {
        return Ok(Ok(existing));
    }

    let Some((status, balance)) = tenants::read_account(tx, &posting.tenant_id)? else {
        return Ok(Err(AinaError::not_found("tenant", posting.tenant_id)));
    };
    if posting.require_active && status != TenantStatus::Active {
        return Ok(Err(AinaError::TenantSuspended {
            tenant_id: posting.tenant_id,
        }));
    }
    let Some(balance_after) = balance.checked_add(posting.amount) else {
        return Ok(Err(AinaError::Internal(
            "credit arithmetic overflow".to_string(),
        )));
    };
    if balance_after.is_negative() {
        return Ok(Err(AinaError::InsufficientCredit {
            balance,
            required: posting.amount.abs(),
        }));
    }

    let entry = LedgerEntry {
        id: EntryId::generate(),
        tenant_id: TenantId(posting.tenant_id),
        amount: posting.amount,
        kind: posting.kind,
        description: posting.description,
        actor_id: posting.actor_id,
        reference: posting.reference,
        balance_after,
        created_at: now,
    };
    entries::insert_entry(tx, &entry)?;
    tenants::write_balance(tx, entry.tenant_id.as_str(), balance_after)?;
    Ok(Ok(entry))
}
