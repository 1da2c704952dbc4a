// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Aina messaging platform.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for tenants,
//! the append-only credit ledger, conversations, messages, automation rules,
//! and payment orders.
//!
//! All writes are serialized through one `tokio-rusqlite` background thread:
//! `Database` wraps a single connection and every query module calls through
//! `connection().call()`. Multi-statement closures are therefore atomic with
//! respect to every other database operation.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::{Database, fmt_ts, map_tr_err, parse_ts};
