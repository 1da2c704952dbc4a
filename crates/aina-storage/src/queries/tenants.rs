// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant CRUD operations.
//!
//! The balance column is never written here; only ledger transactions move it.

use aina_core::{
    AinaError, Credits, Platform, ProviderCredentials, Tenant, TenantId, TenantStatus,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, ts_col};

const TENANT_COLUMNS: &str = "id, name, status, balance_minor, plan, whatsapp_phone_number_id,
     whatsapp_access_token, messenger_page_id, messenger_page_token, created_at";

fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId(row.get(0)?),
        name: row.get(1)?,
        status: enum_col(row, 2)?,
        balance: Credits::from_minor(row.get(3)?),
        plan: row.get(4)?,
        credentials: ProviderCredentials {
            whatsapp_phone_number_id: row.get(5)?,
            whatsapp_access_token: row.get(6)?,
            messenger_page_id: row.get(7)?,
            messenger_page_token: row.get(8)?,
        },
        created_at: ts_col(row, 9)?,
    })
}

/// Insert a new tenant with a zero balance.
pub async fn create_tenant(db: &Database, tenant: &Tenant) -> Result<(), AinaError> {
    let tenant = tenant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, name, status, balance_minor, plan,
                     whatsapp_phone_number_id, whatsapp_access_token,
                     messenger_page_id, messenger_page_token, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tenant.id.0,
                    tenant.name,
                    tenant.status.to_string(),
                    tenant.plan,
                    tenant.credentials.whatsapp_phone_number_id,
                    tenant.credentials.whatsapp_access_token,
                    tenant.credentials.messenger_page_id,
                    tenant.credentials.messenger_page_token,
                    fmt_ts(tenant.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a tenant by ID.
pub async fn get_tenant(db: &Database, id: &TenantId) -> Result<Option<Tenant>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
                params![id],
                row_to_tenant,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List all tenants, newest first.
pub async fn list_tenants(db: &Database) -> Result<Vec<Tenant>, AinaError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at DESC, id"
            ))?;
            let rows = stmt.query_map([], row_to_tenant)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve the tenant that owns a receiving account on a platform.
pub async fn find_by_account(
    db: &Database,
    platform: Platform,
    account_id: &str,
) -> Result<Option<Tenant>, AinaError> {
    let account_id = account_id.to_string();
    let column = match platform {
        Platform::WhatsApp => "whatsapp_phone_number_id",
        Platform::Messenger => "messenger_page_id",
    };
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE {column} = ?1"),
                params![account_id],
                row_to_tenant,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set a tenant's lifecycle status. Returns `false` if the tenant does not exist.
pub async fn set_status(
    db: &Database,
    id: &TenantId,
    status: TenantStatus,
) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE tenants SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a tenant's provider credentials. Returns `false` if the tenant does not exist.
pub async fn set_credentials(
    db: &Database,
    id: &TenantId,
    credentials: &ProviderCredentials,
) -> Result<bool, AinaError> {
    let id = id.0.clone();
    let credentials = credentials.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE tenants SET whatsapp_phone_number_id = ?1, whatsapp_access_token = ?2,
                     messenger_page_id = ?3, messenger_page_token = ?4
                 WHERE id = ?5",
                params![
                    credentials.whatsapp_phone_number_id,
                    credentials.whatsapp_access_token,
                    credentials.messenger_page_id,
                    credentials.messenger_page_token,
                    id,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Read status and cached balance inside an open transaction.
pub fn read_account(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<(TenantStatus, Credits)>> {
    conn.query_row(
        "SELECT status, balance_minor FROM tenants WHERE id = ?1",
        params![id],
        |row| Ok((enum_col(row, 0)?, Credits::from_minor(row.get(1)?))),
    )
    .optional()
}

/// Overwrite the cached balance inside an open transaction.
pub fn write_balance(conn: &rusqlite::Connection, id: &str, balance: Credits) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE tenants SET balance_minor = ?1 WHERE id = ?2",
        params![balance.minor(), id],
    )?;
    Ok(())
}
