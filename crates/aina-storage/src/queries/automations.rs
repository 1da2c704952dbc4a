// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation rule CRUD. Keywords are stored as a JSON array.

use aina_core::{AinaError, AutomationRule, RuleId, TenantId};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, enum_col, fmt_ts, map_tr_err, ts_col};

const RULE_COLUMNS: &str =
    "id, tenant_id, name, trigger_type, keywords, response, active, position, created_at";

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<AutomationRule> {
    let keywords: String = row.get(4)?;
    let keywords: Vec<String> = serde_json::from_str(&keywords)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(AutomationRule {
        id: RuleId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        name: row.get(2)?,
        trigger: enum_col(row, 3)?,
        keywords,
        response: row.get(5)?,
        active: row.get(6)?,
        position: row.get(7)?,
        created_at: ts_col(row, 8)?,
    })
}

fn keywords_json(keywords: &[String]) -> rusqlite::Result<String> {
    serde_json::to_string(keywords).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Insert a rule at the end of the tenant's rule order. Returns the stored rule.
pub async fn create_rule(db: &Database, rule: &AutomationRule) -> Result<AutomationRule, AinaError> {
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            let keywords = keywords_json(&rule.keywords)?;
            conn.query_row(
                &format!(
                    "INSERT INTO automation_rules (id, tenant_id, name, trigger_type, keywords,
                         response, active, position, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                         (SELECT COALESCE(MAX(position), 0) + 1 FROM automation_rules
                          WHERE tenant_id = ?2),
                         ?8)
                     RETURNING {RULE_COLUMNS}"
                ),
                params![
                    rule.id.0,
                    rule.tenant_id.0,
                    rule.name,
                    rule.trigger.to_string(),
                    keywords,
                    rule.response,
                    rule.active,
                    fmt_ts(rule.created_at),
                ],
                row_to_rule,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Get a rule by ID.
pub async fn get_rule(db: &Database, id: &RuleId) -> Result<Option<AutomationRule>, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {RULE_COLUMNS} FROM automation_rules WHERE id = ?1"),
                params![id],
                row_to_rule,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// A tenant's rules in evaluation order. `active_only` skips disabled rules.
pub async fn list_rules(
    db: &Database,
    tenant_id: &TenantId,
    active_only: bool,
) -> Result<Vec<AutomationRule>, AinaError> {
    let tenant_id = tenant_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RULE_COLUMNS} FROM automation_rules
                 WHERE tenant_id = ?1 AND (?2 = 0 OR active = 1)
                 ORDER BY position ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![tenant_id, active_only], row_to_rule)?;
            let mut rules = Vec::new();
            for row in rows {
                rules.push(row?);
            }
            Ok(rules)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite a rule's editable fields. Returns `false` if it does not exist.
pub async fn update_rule(db: &Database, rule: &AutomationRule) -> Result<bool, AinaError> {
    let rule = rule.clone();
    db.connection()
        .call(move |conn| {
            let keywords = keywords_json(&rule.keywords)?;
            let changed = conn.execute(
                "UPDATE automation_rules SET name = ?1, trigger_type = ?2, keywords = ?3,
                     response = ?4, active = ?5
                 WHERE id = ?6",
                params![
                    rule.name,
                    rule.trigger.to_string(),
                    keywords,
                    rule.response,
                    rule.active,
                    rule.id.0,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a rule. Returns `false` if it does not exist.
pub async fn delete_rule(db: &Database, id: &RuleId) -> Result<bool, AinaError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM automation_rules WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
