// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation rule drafts and their validation.

use aina_core::{AinaError, AutomationRule, RuleId, TenantId, TriggerType};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Longest auto-reply body accepted, in characters.
pub const MAX_RESPONSE_CHARS: usize = 4096;
/// Most keywords one rule may carry.
pub const MAX_KEYWORDS: usize = 64;

/// A rule as submitted by a tenant, before it is stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDraft {
    pub name: String,
    pub trigger: TriggerType,
    pub keywords: Vec<String>,
    pub response: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleDraft {
    /// Build the stored rule. Keywords are trimmed and blanks dropped; the
    /// position is assigned by storage.
    pub fn into_rule(self, tenant_id: TenantId, now: DateTime<Utc>) -> AutomationRule {
        AutomationRule {
            id: RuleId::generate(),
            tenant_id,
            name: self.name.trim().to_string(),
            trigger: self.trigger,
            keywords: clean_keywords(&self.keywords),
            response: self.response,
            active: self.active,
            position: 0,
            created_at: now,
        }
    }

    /// Apply this draft's fields onto an existing rule, keeping its identity.
    pub fn apply_to(self, rule: &mut AutomationRule) {
        rule.name = self.name.trim().to_string();
        rule.trigger = self.trigger;
        rule.keywords = clean_keywords(&self.keywords);
        rule.response = self.response;
        rule.active = self.active;
    }
}

fn clean_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check a draft before it is stored.
pub fn validate_rule(draft: &RuleDraft) -> Result<(), AinaError> {
    if draft.name.trim().is_empty() {
        return Err(AinaError::InvalidAutomationRule(
            "name must not be empty".to_string(),
        ));
    }
    if draft.keywords.len() > MAX_KEYWORDS {
        return Err(AinaError::InvalidAutomationRule(format!(
            "at most {MAX_KEYWORDS} keywords are allowed, got {}",
            draft.keywords.len()
        )));
    }
    if draft.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(AinaError::InvalidAutomationRule(
            "at least one non-blank keyword is required".to_string(),
        ));
    }
    if draft.response.trim().is_empty() {
        return Err(AinaError::InvalidAutomationRule(
            "response must not be empty".to_string(),
        ));
    }
    let chars = draft.response.chars().count();
    if chars > MAX_RESPONSE_CHARS {
        return Err(AinaError::InvalidAutomationRule(format!(
            "response is {chars} characters, limit is {MAX_RESPONSE_CHARS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RuleDraft {
        RuleDraft {
            name: "greeting".into(),
            trigger: TriggerType::ExactMatch,
            keywords: vec!["hi".into(), "  ".into(), " hello ".into()],
            response: "Hello! How can we help?".into(),
            active: true,
        }
    }

    #[test]
    fn valid_draft_passes_and_cleans_keywords() {
        let d = draft();
        validate_rule(&d).unwrap();
        let rule = d.into_rule(TenantId::from("acme"), Utc::now());
        assert_eq!(rule.keywords, vec!["hi".to_string(), "hello".to_string()]);
    }

    #[test]
    fn blank_fields_rejected() {
        let mut d = draft();
        d.name = " ".into();
        assert!(matches!(
            validate_rule(&d),
            Err(AinaError::InvalidAutomationRule(_))
        ));

        let mut d = draft();
        d.keywords = vec!["".into(), "   ".into()];
        assert!(validate_rule(&d).is_err());

        let mut d = draft();
        d.response = "\n".into();
        assert!(validate_rule(&d).is_err());
    }

    #[test]
    fn limits_enforced() {
        let mut d = draft();
        d.response = "x".repeat(MAX_RESPONSE_CHARS + 1);
        assert!(validate_rule(&d).is_err());

        let mut d = draft();
        d.keywords = (0..=MAX_KEYWORDS).map(|i| format!("k{i}")).collect();
        assert!(validate_rule(&d).is_err());
    }

    #[test]
    fn draft_deserializes_with_default_active() {
        let d: RuleDraft = serde_json::from_str(
            r#"{"name":"p","trigger":"KEYWORD_MATCH","keywords":["price"],"response":"₹1"}"#,
        )
        .unwrap();
        assert!(d.active);
        assert_eq!(d.trigger, TriggerType::KeywordMatch);
    }
}
