// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Aina integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock messaging provider with scripted outcomes and request capture
//! - [`TestHarness`] - Full engine over a temp database and a manual clock
//! - [`payloads`] - Webhook bodies shaped like Meta's deliveries

pub mod harness;
pub mod mock_provider;
pub mod payloads;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockOutcome, MockProvider};
