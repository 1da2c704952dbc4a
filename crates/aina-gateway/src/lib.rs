// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Aina platform.
//!
//! Exposes the tenant and admin REST API under `/v1`, the provider and
//! payment webhooks under `/webhooks`, and realtime event delivery over
//! WebSocket (`/v1/ws`) and SSE (`/v1/events`). Every handler delegates to
//! the [`aina_engine::Engine`] services with the caller's `AuthContext`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;
pub mod webhooks;
pub mod ws;

pub use auth::TokenTable;
pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, HealthState, router, start_server};
