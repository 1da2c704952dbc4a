// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event fan-out for the Aina messaging platform.
//!
//! Delivery is best-effort and at-most-once to live connections. Durable
//! state is the source of truth; a client that reconnects or receives a
//! `resync` event re-fetches instead of replaying missed events.

pub mod bus;
pub mod events;

pub use bus::{EventBus, Subscription};
pub use events::{EventEnvelope, RealtimeEvent};
