// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation rules for the Aina messaging platform.
//!
//! This crate provides:
//! - [`match_rule`]: Keyword matching of inbound text (first active match wins)
//! - [`validate_rule`]: Checks applied to tenant-submitted rule drafts

pub mod matcher;
pub mod rules;

pub use matcher::{match_rule, normalize};
pub use rules::{RuleDraft, validate_rule};
