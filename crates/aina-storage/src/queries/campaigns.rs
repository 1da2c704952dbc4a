// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast campaigns and their recipient lists.
//!
//! A recipient row records whether it was attempted and which outbound
//! message (if any) it produced. Campaign statistics are computed by joining
//! those rows with the current message statuses.

use aina_core::{AinaError, Campaign, CampaignId, CampaignStats, CampaignStatus, MessageId, TenantId};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, opt_ts_col, ts_col};

const CAMPAIGN_COLUMNS: &str = "id, tenant_id, name, platform, template_name, template_language,
     status, created_at, started_at, finished_at";

fn row_to_campaign(row: &rusqlite::Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: CampaignId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        name: row.get(2)?,
        platform: enum_col(row, 3)?,
        template_name: row.get(4)?,
        template_language: row.get(5)?,
        status: enum_col(row, 6)?,
        created_at: ts_col(row, 7)?,
        started_at: opt_ts_col(row, 8)?,
        finished_at: opt_ts_col(row, 9)?,
    })
}

/// A recipient still waiting for its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecipient {
    pub position: i64,
    pub contact_id: String,
}

/// Insert a campaign and its audience, in order, in one transaction.
pub async fn create_campaign(
    db: &Database,
    campaign: &Campaign,
    audience: &[String],
) -> Result<(), AinaError> {
    let campaign = campaign.clone();
    let audience = audience.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO campaigns (id, tenant_id, name, platform, template_name,
                     template_language, status, created_at, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL)",
                params![
                    campaign.id.0,
                    campaign.tenant_id.0,
                    campaign.name,
                    campaign.platform.to_string(),
                    campaign.template_name,
                    campaign.template_language,
                    campaign.status.to_string(),
                    fmt_ts(campaign.created_at),
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO campaign_recipients (campaign_id, position, contact_id)
                     VALUES (?1, ?2, ?3)",
                )?;
                for (position, contact_id) in audience.iter().enumerate() {
                    stmt.execute(params![campaign.id.0, position as i64, contact_id])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a campaign by ID.
pub async fn get_campaign(db: &Database, id: &CampaignId) -> Result<Option<Campaign>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                row_to_campaign,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// A tenant's campaigns, newest first.
pub async fn list_campaigns(db: &Database, tenant_id: &TenantId) -> Result<Vec<Campaign>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE tenant_id = ?1 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], row_to_campaign)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Campaigns left SENDING, across all tenants.
pub async fn list_sending(db: &Database) -> Result<Vec<Campaign>, AinaError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = 'SENDING'"
            ))?;
            let rows = stmt.query_map([], row_to_campaign)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Move DRAFT to SENDING. Returns `false` if the campaign was not a draft,
/// so two concurrent launches cannot both start it.
pub async fn begin_sending(
    db: &Database,
    id: &CampaignId,
    at: DateTime<Utc>,
) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE campaigns SET status = 'SENDING', started_at = ?2
                 WHERE id = ?1 AND status = 'DRAFT'",
                params![id, fmt_ts(at)],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Move SENDING to a final status. Returns `false` if it was not sending.
pub async fn finish(
    db: &Database,
    id: &CampaignId,
    status: CampaignStatus,
    at: DateTime<Utc>,
) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE campaigns SET status = ?2, finished_at = ?3
                 WHERE id = ?1 AND status = 'SENDING'",
                params![id, status.to_string(), fmt_ts(at)],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Recipients not attempted yet, in audience order.
pub async fn pending_recipients(
    db: &Database,
    id: &CampaignId,
) -> Result<Vec<PendingRecipient>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT position, contact_id FROM campaign_recipients
                 WHERE campaign_id = ?1 AND attempted = 0 ORDER BY position",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(PendingRecipient {
                    position: row.get(0)?,
                    contact_id: row.get(1)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Record one recipient's attempt: the message it produced, or why none was.
pub async fn record_attempt(
    db: &Database,
    id: &CampaignId,
    position: i64,
    message_id: Option<&MessageId>,
    error: Option<&str>,
) -> Result<(), AinaError> {
    let id = id.0.clone();
    let message_id = message_id.map(|m| m.0.clone());
    let error = error.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE campaign_recipients SET attempted = 1, message_id = ?3, error = ?4
                 WHERE campaign_id = ?1 AND position = ?2",
                params![id, position, message_id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark every unattempted recipient failed with `reason`. Returns how many.
pub async fn fail_remaining(db: &Database, id: &CampaignId, reason: &str) -> Result<usize, AinaError> {
    let id = id.0.clone();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE campaign_recipients SET attempted = 1, error = ?2
                 WHERE campaign_id = ?1 AND attempted = 0",
                params![id, reason],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome counts from the recipient rows and their messages' current status.
pub async fn campaign_stats(db: &Database, id: &CampaignId) -> Result<CampaignStats, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*),
                     COALESCE(SUM(r.attempted = 0 OR m.status = 'QUEUED'), 0),
                     COALESCE(SUM(m.status IN ('SENT', 'DELIVERED', 'READ')), 0),
                     COALESCE(SUM(m.status IN ('DELIVERED', 'READ')), 0),
                     COALESCE(SUM(m.status = 'READ'), 0),
                     COALESCE(SUM(r.attempted = 1
                         AND (r.message_id IS NULL OR m.status = 'FAILED')), 0)
                 FROM campaign_recipients r
                 LEFT JOIN messages m ON m.id = r.message_id
                 WHERE r.campaign_id = ?1",
                params![id],
                |row| {
                    Ok(CampaignStats {
                        total: row.get::<_, i64>(0)? as u64,
                        pending: row.get::<_, i64>(1)? as u64,
                        sent: row.get::<_, i64>(2)? as u64,
                        delivered: row.get::<_, i64>(3)? as u64,
                        read: row.get::<_, i64>(4)? as u64,
                        failed: row.get::<_, i64>(5)? as u64,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a campaign that is not sending. Returns `false` if nothing was deleted.
pub async fn delete_campaign(db: &Database, id: &CampaignId) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM campaigns WHERE id = ?1 AND status != 'SENDING'",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
