// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation operations, including the session-window timestamp.

use aina_core::{AinaError, Conversation, ConversationId, Platform, TenantId};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, opt_ts_col, ts_col};

const CONVERSATION_COLUMNS: &str = "id, tenant_id, platform, contact_id, contact_name,
     last_inbound_at, last_message_at, assigned_agent, created_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        platform: enum_col(row, 2)?,
        contact_id: row.get(3)?,
        contact_name: row.get(4)?,
        last_inbound_at: opt_ts_col(row, 5)?,
        last_message_at: opt_ts_col(row, 6)?,
        assigned_agent: row.get(7)?,
        created_at: ts_col(row, 8)?,
    })
}

/// Which conversations to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationFilter {
    All,
    AssignedTo(String),
    Unassigned,
}

/// Find or create the conversation for a contact, refreshing the display name
/// when the provider sends one.
pub async fn upsert_conversation(
    db: &Database,
    tenant_id: &TenantId,
    platform: Platform,
    contact_id: &str,
    contact_name: Option<&str>,
    at: DateTime<Utc>,
) -> Result<Conversation, AinaError> {
    let id = ConversationId::generate().0;
    let tenant_id = tenant_id.0.clone();
    let contact_id = contact_id.to_string();
    let contact_name = contact_name.map(str::to_string);
    let at = fmt_ts(at);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO conversations (id, tenant_id, platform, contact_id, contact_name, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (tenant_id, platform, contact_id) DO UPDATE SET
                         contact_name = COALESCE(excluded.contact_name, conversations.contact_name)
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                params![id, tenant_id, platform.to_string(), contact_id, contact_name, at],
                row_to_conversation,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by ID.
pub async fn get_conversation(
    db: &Database,
    id: &ConversationId,
) -> Result<Option<Conversation>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List a tenant's conversations, most recently active first.
pub async fn list_conversations(
    db: &Database,
    tenant_id: &TenantId,
    filter: ConversationFilter,
) -> Result<Vec<Conversation>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            let order = "ORDER BY COALESCE(last_message_at, created_at) DESC, id";
            let mut conversations = Vec::new();
            match filter {
                ConversationFilter::All => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 {order}"
                    ))?;
                    for row in stmt.query_map(params![tenant_id], row_to_conversation)? {
                        conversations.push(row?);
                    }
                }
                ConversationFilter::AssignedTo(agent) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 AND assigned_agent = ?2 {order}"
                    ))?;
                    for row in stmt.query_map(params![tenant_id, agent], row_to_conversation)? {
                        conversations.push(row?);
                    }
                }
                ConversationFilter::Unassigned => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 AND assigned_agent IS NULL {order}"
                    ))?;
                    for row in stmt.query_map(params![tenant_id], row_to_conversation)? {
                        conversations.push(row?);
                    }
                }
            }
            Ok(conversations)
        })
        .await
        .map_err(map_tr_err)
}

/// Record an inbound message time. `last_inbound_at` never moves backwards,
/// so a late redelivery cannot shorten the session window.
pub async fn record_inbound(
    db: &Database,
    id: &ConversationId,
    at: DateTime<Utc>,
) -> Result<(), AinaError> {
    let id = id.0.clone();
    let at = fmt_ts(at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET
                     last_inbound_at = CASE
                         WHEN last_inbound_at IS NULL OR last_inbound_at < ?1 THEN ?1
                         ELSE last_inbound_at END,
                     last_message_at = CASE
                         WHEN last_message_at IS NULL OR last_message_at < ?1 THEN ?1
                         ELSE last_message_at END
                 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Bump `last_message_at` for outbound activity.
pub async fn touch(db: &Database, id: &ConversationId, at: DateTime<Utc>) -> Result<(), AinaError> {
    let id = id.0.clone();
    let at = fmt_ts(at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_message_at = ?1
                 WHERE id = ?2 AND (last_message_at IS NULL OR last_message_at < ?1)",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Assign (or with `None`, unassign) an agent. Returns `false` if no such conversation.
pub async fn assign(
    db: &Database,
    id: &ConversationId,
    agent: Option<&str>,
) -> Result<bool, AinaError> {
    let id = id.0.clone();
    let agent = agent.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations SET assigned_agent = ?1 WHERE id = ?2",
                params![agent, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation and, by cascade, its messages. Ledger entries stay.
pub async fn delete_conversation(db: &Database, id: &ConversationId) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
