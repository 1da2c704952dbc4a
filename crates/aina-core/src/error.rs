// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Aina messaging platform.

use thiserror::Error;

use crate::types::Credits;

/// The primary error type used across all Aina crates.
#[derive(Debug, Error)]
pub enum AinaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The requested entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The entity belongs to a different tenant than the authenticated caller.
    #[error("tenant mismatch: caller {caller} cannot act on tenant {target}")]
    TenantMismatch { caller: String, target: String },

    /// The caller lacks the role required for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The tenant's balance does not cover the requested debit.
    #[error("insufficient credit: balance {balance}, required {required}")]
    InsufficientCredit { balance: Credits, required: Credits },

    /// The tenant is not ACTIVE and may not spend credit.
    #[error("tenant {tenant_id} is not active")]
    TenantSuspended { tenant_id: String },

    /// A free-form message was requested outside the 24h session window.
    #[error("session window closed for conversation {conversation_id}; send a template message")]
    SessionWindowClosed { conversation_id: String },

    /// The messaging provider refused or failed the dispatch.
    #[error("provider dispatch failed: {message}")]
    ProviderDispatchFailed { message: String, retryable: bool },

    /// The provider re-delivered a webhook event that was already ingested.
    #[error("duplicate webhook event: {provider_message_id}")]
    DuplicateWebhookEvent { provider_message_id: String },

    /// An automation rule failed validation.
    #[error("invalid automation rule: {0}")]
    InvalidAutomationRule(String),

    /// A ledger amount was zero, malformed, or out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A request failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AinaError {
    /// Shorthand for a [`AinaError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Storage { .. } => "storage",
            Self::NotFound { .. } => "not_found",
            Self::TenantMismatch { .. } => "tenant_mismatch",
            Self::Forbidden(_) => "forbidden",
            Self::InsufficientCredit { .. } => "insufficient_credit",
            Self::TenantSuspended { .. } => "tenant_suspended",
            Self::SessionWindowClosed { .. } => "session_window_closed",
            Self::ProviderDispatchFailed { .. } => "provider_dispatch_failed",
            Self::DuplicateWebhookEvent { .. } => "duplicate_webhook_event",
            Self::InvalidAutomationRule(_) => "invalid_automation_rule",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Validation(_) => "validation",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_credit_formats_amounts() {
        let err = AinaError::InsufficientCredit {
            balance: Credits::from_minor(50),
            required: Credits::from_minor(150),
        };
        assert_eq!(
            err.to_string(),
            "insufficient credit: balance 0.50, required 1.50"
        );
        assert_eq!(err.code(), "insufficient_credit");
    }

    #[test]
    fn not_found_helper() {
        let err = AinaError::not_found("conversation", "c-1");
        assert_eq!(err.to_string(), "conversation not found: c-1");
    }
}
