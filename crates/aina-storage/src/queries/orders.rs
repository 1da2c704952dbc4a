// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment orders for credit packs.

use aina_core::{AinaError, Credits, OrderStatus, PaymentOrder, TenantId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, ts_col};

const ORDER_COLUMNS: &str = "id, tenant_id, pack_id, credits_minor, price_minor, status, created_at";

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentOrder> {
    Ok(PaymentOrder {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        pack_id: row.get(2)?,
        credits: Credits::from_minor(row.get(3)?),
        price_minor: row.get(4)?,
        status: enum_col(row, 5)?,
        created_at: ts_col(row, 6)?,
    })
}

/// Create a pending order.
pub async fn create_order(db: &Database, order: &PaymentOrder) -> Result<(), AinaError> {
    let order = order.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO payment_orders (id, tenant_id, pack_id, credits_minor, price_minor,
                     status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    order.id,
                    order.tenant_id.0,
                    order.pack_id,
                    order.credits.minor(),
                    order.price_minor,
                    order.status.to_string(),
                    fmt_ts(order.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an order by ID.
pub async fn get_order(db: &Database, id: &str) -> Result<Option<PaymentOrder>, AinaError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| find_order(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Fetch an order inside an open transaction.
pub fn find_order(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<PaymentOrder>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM payment_orders WHERE id = ?1"),
        params![id],
        row_to_order,
    )
    .optional()
}

/// Set an order's status inside an open transaction.
pub fn write_status(
    conn: &rusqlite::Connection,
    id: &str,
    status: OrderStatus,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE payment_orders SET status = ?1 WHERE id = ?2",
        params![status.to_string(), id],
    )?;
    Ok(changed > 0)
}

/// Mark an unpaid order FAILED. Paid orders are left alone.
pub async fn mark_failed(db: &Database, id: &str) -> Result<bool, AinaError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE payment_orders SET status = 'FAILED' WHERE id = ?1 AND status = 'PENDING'",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// A tenant's orders, newest first.
pub async fn list_orders(db: &Database, tenant_id: &TenantId) -> Result<Vec<PaymentOrder>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM payment_orders
                 WHERE tenant_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], row_to_order)?;
            let mut orders = Vec::new();
            for row in rows {
                orders.push(row?);
            }
            Ok(orders)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants;
    use aina_core::{ProviderCredentials, Tenant, TenantStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn order_lifecycle() {
        let db = Database::open_in_memory().await.unwrap();
        tenants::create_tenant(
            &db,
            &Tenant {
                id: TenantId::from("acme"),
                name: "Acme".into(),
                status: TenantStatus::Active,
                balance: Credits::ZERO,
                plan: None,
                credentials: ProviderCredentials::default(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let order = PaymentOrder {
            id: "order-1".into(),
            tenant_id: TenantId::from("acme"),
            pack_id: "starter".into(),
            credits: Credits::whole(1000),
            price_minor: 50_000,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        create_order(&db, &order).await.unwrap();

        let stored = get_order(&db, "order-1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.credits, Credits::whole(1000));

        assert!(mark_failed(&db, "order-1").await.unwrap());
        assert!(!mark_failed(&db, "order-1").await.unwrap());
        assert_eq!(list_orders(&db, &TenantId::from("acme")).await.unwrap().len(), 1);
    }
}
