// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger entry persistence.
//!
//! Entries are append-only: the schema aborts any UPDATE or DELETE. The
//! synchronous helpers run inside transactions composed by the credit ledger.

use aina_core::{AinaError, Credits, EntryId, LedgerEntry, LedgerKind, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, ts_col};

const ENTRY_COLUMNS: &str = "id, tenant_id, amount_minor, kind, description, actor_id,
     reference, balance_after_minor, created_at";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: EntryId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        amount: Credits::from_minor(row.get(2)?),
        kind: enum_col(row, 3)?,
        description: row.get(4)?,
        actor_id: row.get(5)?,
        reference: row.get(6)?,
        balance_after: Credits::from_minor(row.get(7)?),
        created_at: ts_col(row, 8)?,
    })
}

/// Append one entry.
pub fn insert_entry(conn: &rusqlite::Connection, entry: &LedgerEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO ledger_entries (id, tenant_id, amount_minor, kind, description,
             actor_id, reference, balance_after_minor, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id.0,
            entry.tenant_id.0,
            entry.amount.minor(),
            entry.kind.to_string(),
            entry.description,
            entry.actor_id,
            entry.reference,
            entry.balance_after.minor(),
            fmt_ts(entry.created_at),
        ],
    )?;
    Ok(())
}

/// Find the tenant's entry of `kind` carrying an idempotency `reference`.
pub fn find_by_reference(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    kind: LedgerKind,
    reference: &str,
) -> rusqlite::Result<Option<LedgerEntry>> {
    conn.query_row(
        &format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries
             WHERE tenant_id = ?1 AND kind = ?2 AND reference = ?3"
        ),
        params![tenant_id, kind.to_string(), reference],
        row_to_entry,
    )
    .optional()
}

/// Fetch one entry by id.
pub fn find_entry(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<LedgerEntry>> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = ?1"),
        params![id],
        row_to_entry,
    )
    .optional()
}

/// Most recent entries for a tenant, newest first.
pub async fn list_entries(
    db: &Database,
    tenant_id: &TenantId,
    limit: usize,
) -> Result<Vec<LedgerEntry>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM ledger_entries
                 WHERE tenant_id = ?1 ORDER BY rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![tenant_id, limit], row_to_entry)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Get an entry by id.
pub async fn get_entry(db: &Database, id: &EntryId) -> Result<Option<LedgerEntry>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| find_entry(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Cached balance and the sum of all entries, read in one snapshot.
pub async fn balance_snapshot(
    db: &Database,
    tenant_id: &TenantId,
) -> Result<Option<(Credits, Credits)>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT t.balance_minor,
                        (SELECT COALESCE(SUM(amount_minor), 0) FROM ledger_entries
                         WHERE tenant_id = t.id)
                 FROM tenants t WHERE t.id = ?1",
                params![tenant_id],
                |row| {
                    Ok((
                        Credits::from_minor(row.get(0)?),
                        Credits::from_minor(row.get(1)?),
                    ))
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Per-kind totals derived from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindTotals {
    pub purchased: Credits,
    pub admin_credited: Credits,
    /// Absolute value of admin debits.
    pub admin_debited: Credits,
    /// Absolute value of message charges.
    pub charged: Credits,
    pub refunded: Credits,
    pub charge_count: i64,
    pub refund_count: i64,
}

/// Aggregate a tenant's ledger by kind.
pub async fn totals_by_kind(db: &Database, tenant_id: &TenantId) -> Result<KindTotals, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, COALESCE(SUM(amount_minor), 0), COUNT(*)
                 FROM ledger_entries WHERE tenant_id = ?1 GROUP BY kind",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok((
                    enum_col::<LedgerKind>(row, 0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            let mut totals = KindTotals::default();
            for row in rows {
                let (kind, sum, count) = row?;
                let amount = Credits::from_minor(sum.abs());
                match kind {
                    LedgerKind::Purchase => totals.purchased = amount,
                    LedgerKind::AdminCredit => totals.admin_credited = amount,
                    LedgerKind::AdminDebit => totals.admin_debited = amount,
                    LedgerKind::MessageCharge => {
                        totals.charged = amount;
                        totals.charge_count = count;
                    }
                    LedgerKind::Refund => {
                        totals.refunded = amount;
                        totals.refund_count = count;
                    }
                }
            }
            Ok(totals)
        })
        .await
        .map_err(map_tr_err)
}
