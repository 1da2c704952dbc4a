// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging provider adapters for the Aina platform.
//!
//! This crate provides:
//! - [`WhatsAppCloudProvider`] and [`MessengerProvider`]: Graph API clients
//!   implementing [`aina_core::MessagingProvider`]
//! - [`webhook`]: Provider webhook payloads parsed into [`WebhookEvent`]s
//! - [`signature`]: `X-Hub-Signature-256` verification

mod graph;
pub mod messenger;
pub mod signature;
pub mod webhook;
pub mod whatsapp;

pub use messenger::MessengerProvider;
pub use signature::{SIGNATURE_HEADER, sign, verify_signature};
pub use webhook::{InboundMessage, StatusUpdate, WebhookEvent, parse_payload};
pub use whatsapp::WhatsAppCloudProvider;
