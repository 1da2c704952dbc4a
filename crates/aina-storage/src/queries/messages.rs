// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and status transitions.

use aina_core::{
    AinaError, ConversationId, Credits, EntryId, Message, MessageId, MessageStatus, Platform,
    StatusTransition, TenantId,
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, ts_col};

const MESSAGE_COLUMNS: &str = "id, conversation_id, tenant_id, platform, direction, kind, body,
     media_ref, status, provider_message_id, cost_minor, charge_entry_id, error,
     created_at, updated_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        tenant_id: TenantId(row.get(2)?),
        platform: enum_col(row, 3)?,
        direction: enum_col(row, 4)?,
        kind: enum_col(row, 5)?,
        body: row.get(6)?,
        media_ref: row.get(7)?,
        status: enum_col(row, 8)?,
        provider_message_id: row.get(9)?,
        cost: Credits::from_minor(row.get(10)?),
        charge_entry_id: row.get::<_, Option<String>>(11)?.map(EntryId),
        error: row.get(12)?,
        created_at: ts_col(row, 13)?,
        updated_at: ts_col(row, 14)?,
    })
}

fn insert_sql(verb: &str) -> String {
    format!(
        "{verb} INTO messages (id, conversation_id, tenant_id, platform, direction, kind, body,
             media_ref, status, provider_message_id, cost_minor, charge_entry_id, error,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
    )
}

fn insert_with(conn: &rusqlite::Connection, verb: &str, m: &Message) -> rusqlite::Result<usize> {
    conn.execute(
        &insert_sql(verb),
        params![
            m.id.0,
            m.conversation_id.0,
            m.tenant_id.0,
            m.platform.to_string(),
            m.direction.to_string(),
            m.kind.to_string(),
            m.body,
            m.media_ref,
            m.status.to_string(),
            m.provider_message_id,
            m.cost.minor(),
            m.charge_entry_id.as_ref().map(|e| e.0.clone()),
            m.error,
            fmt_ts(m.created_at),
            fmt_ts(m.updated_at),
        ],
    )
}

/// Insert an outbound message.
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), AinaError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            insert_with(conn, "INSERT", &message)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an inbound message unless its provider id was already stored.
///
/// Returns `false` for a redelivered event.
pub async fn insert_inbound(db: &Database, message: &Message) -> Result<bool, AinaError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| Ok(insert_with(conn, "INSERT OR IGNORE", &message)? > 0))
        .await
        .map_err(map_tr_err)
}

/// Get a message by ID.
pub async fn get_message(db: &Database, id: &MessageId) -> Result<Option<Message>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Look a message up by the id the provider assigned to it.
pub async fn find_by_provider_id(
    db: &Database,
    platform: Platform,
    provider_message_id: &str,
) -> Result<Option<Message>, AinaError> {
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE platform = ?1 AND provider_message_id = ?2"
                ),
                params![platform.to_string(), provider_message_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages in a conversation, oldest first, capped at `limit` most recent.
pub async fn list_messages(
    db: &Database,
    conversation_id: &ConversationId,
    limit: usize,
) -> Result<Vec<Message>, AinaError> {
    let conversation_id = conversation_id.0.clone();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM (
                     SELECT {MESSAGE_COLUMNS}, rowid AS seq FROM messages
                     WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT ?2
                 ) ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Attach the provider id after a successful dispatch and move QUEUED to SENT.
///
/// A status callback that already advanced the message is left alone.
pub async fn mark_sent(
    db: &Database,
    id: &MessageId,
    provider_message_id: &str,
    at: DateTime<Utc>,
) -> Result<StatusTransition, AinaError> {
    let id = id.0.clone();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET provider_message_id = ?1 WHERE id = ?2",
                params![provider_message_id, id],
            )?;
            apply_transition(conn, &id, MessageStatus::Sent, None, &fmt_ts(at))
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a status update, honouring the forward-only state machine.
///
/// Returns what happened; unknown ids yield `Rejected`.
pub async fn advance_status(
    db: &Database,
    id: &MessageId,
    next: MessageStatus,
    error: Option<&str>,
    at: DateTime<Utc>,
) -> Result<StatusTransition, AinaError> {
    let id = id.0.clone();
    let error = error.map(str::to_string);
    db.connection()
        .call(move |conn| apply_transition(conn, &id, next, error.as_deref(), &fmt_ts(at)))
        .await
        .map_err(map_tr_err)
}

fn apply_transition(
    conn: &rusqlite::Connection,
    id: &str,
    next: MessageStatus,
    error: Option<&str>,
    at: &str,
) -> rusqlite::Result<StatusTransition> {
    let current: Option<MessageStatus> = conn
        .query_row(
            "SELECT status FROM messages WHERE id = ?1",
            params![id],
            |row| enum_col(row, 0),
        )
        .optional()?;
    let Some(current) = current else {
        return Ok(StatusTransition::Rejected);
    };
    let transition = current.advance(next);
    if transition == StatusTransition::Advanced {
        // Conditional on the status just read so a racing writer cannot be overwritten.
        let changed = conn.execute(
            "UPDATE messages SET status = ?1, error = COALESCE(?2, error), updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![next.to_string(), error, at, id, current.to_string()],
        )?;
        if changed == 0 {
            return Ok(StatusTransition::Rejected);
        }
    }
    Ok(transition)
}

/// Message counts for a tenant, used in usage summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCounts {
    pub inbound: i64,
    pub outbound: i64,
    pub failed: i64,
}

/// Count a tenant's stored messages by direction.
pub async fn count_messages(db: &Database, tenant_id: &TenantId) -> Result<MessageCounts, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT
                     COALESCE(SUM(direction = 'inbound'), 0),
                     COALESCE(SUM(direction = 'outbound'), 0),
                     COALESCE(SUM(status = 'FAILED'), 0)
                 FROM messages WHERE tenant_id = ?1",
                params![tenant_id],
                |row| {
                    Ok(MessageCounts {
                        inbound: row.get(0)?,
                        outbound: row.get(1)?,
                        failed: row.get(2)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{conversations, tenants};
    use aina_core::{Direction, MessageKind, ProviderCredentials, Tenant, TenantStatus};

    async fn setup() -> (Database, ConversationId) {
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
        let conv = conversations::upsert_conversation(
            &db,
            &TenantId::from("acme"),
            Platform::WhatsApp,
            "+911",
            None,
            Utc::now(),
        )
        .await
        .unwrap();
        (db, conv.id)
    }

    fn make_message(conv: &ConversationId, direction: Direction, pmid: Option<&str>) -> Message {
        let now = Utc::now();
        Message {
            id: MessageId::generate(),
            conversation_id: conv.clone(),
            tenant_id: TenantId::from("acme"),
            platform: Platform::WhatsApp,
            direction,
            kind: MessageKind::Text,
            body: "hello".into(),
            media_ref: None,
            status: if direction == Direction::Inbound {
                MessageStatus::Delivered
            } else {
                MessageStatus::Queued
            },
            provider_message_id: pmid.map(str::to_string),
            cost: Credits::ZERO,
            charge_entry_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn inbound_dedup_by_provider_id() {
        let (db, conv) = setup().await;
        let first = make_message(&conv, Direction::Inbound, Some("wamid.1"));
        let replay = make_message(&conv, Direction::Inbound, Some("wamid.1"));
        assert!(insert_inbound(&db, &first).await.unwrap());
        assert!(!insert_inbound(&db, &replay).await.unwrap());
        assert_eq!(list_messages(&db, &conv, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_never_moves_backwards() {
        let (db, conv) = setup().await;
        let msg = make_message(&conv, Direction::Outbound, None);
        insert_message(&db, &msg).await.unwrap();

        let now = Utc::now();
        assert_eq!(
            mark_sent(&db, &msg.id, "wamid.out", now).await.unwrap(),
            StatusTransition::Advanced
        );
        assert_eq!(
            advance_status(&db, &msg.id, MessageStatus::Read, None, now).await.unwrap(),
            StatusTransition::Advanced
        );
        assert_eq!(
            advance_status(&db, &msg.id, MessageStatus::Delivered, None, now)
                .await
                .unwrap(),
            StatusTransition::Rejected
        );
        assert_eq!(
            advance_status(&db, &msg.id, MessageStatus::Read, None, now).await.unwrap(),
            StatusTransition::Unchanged
        );

        let stored = find_by_provider_id(&db, Platform::WhatsApp, "wamid.out")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn failure_records_error_text() {
        let (db, conv) = setup().await;
        let msg = make_message(&conv, Direction::Outbound, None);
        insert_message(&db, &msg).await.unwrap();
        advance_status(&db, &msg.id, MessageStatus::Failed, Some("recipient blocked"), Utc::now())
            .await
            .unwrap();
        let stored = get_message(&db, &msg.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("recipient blocked"));

        let counts = count_messages(&db, &TenantId::from("acme")).await.unwrap();
        assert_eq!(counts.outbound, 1);
        assert_eq!(counts.failed, 1);
    }

    #[tokio::test]
    async fn purge_cascades_to_messages() {
        let (db, conv) = setup().await;
        let msg = make_message(&conv, Direction::Inbound, Some("wamid.9"));
        insert_inbound(&db, &msg).await.unwrap();
        conversations::delete_conversation(&db, &conv).await.unwrap();
        assert!(get_message(&db, &msg.id).await.unwrap().is_none());
    }
}
