// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger and message pricing for the Aina messaging platform.
//!
//! This crate provides:
//! - **Credit ledger**: Append-only signed entries with atomic check-and-debit,
//!   idempotent refunds and purchase credits, and balance reconciliation
//! - **Pricing**: Per-message-kind costs loaded from configuration

pub mod ledger;
pub mod pricing;

pub use ledger::{CreditLedger, Reconciliation, UsageSummary};
pub use pricing::PriceTable;
