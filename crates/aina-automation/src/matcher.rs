// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword matching of inbound text against a tenant's automation rules.
//!
//! Pure and allocation-light: no I/O, no clock. Only inbound messages are
//! passed here, so an auto-reply can never trigger another auto-reply.

use aina_core::{AutomationRule, TriggerType};

/// Normalize text for comparison: trim surrounding whitespace, lowercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Find the rule that fires for `text`.
///
/// `rules` must be in tenant priority order (ascending position). Inactive
/// rules are skipped. At most one rule fires: the first that matches.
pub fn match_rule<'a>(text: &str, rules: &'a [AutomationRule]) -> Option<&'a AutomationRule> {
    let text = normalize(text);
    if text.is_empty() {
        return None;
    }
    rules
        .iter()
        .filter(|rule| rule.active)
        .find(|rule| rule_matches(&text, rule))
}

fn rule_matches(normalized_text: &str, rule: &AutomationRule) -> bool {
    rule.keywords
        .iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .any(|keyword| match rule.trigger {
            TriggerType::ExactMatch => normalized_text == keyword,
            TriggerType::KeywordMatch => normalized_text.contains(&keyword),
        })
}
