// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer-service session window.
//!
//! A platform may restrict free-form (non-template) messages to a fixed
//! window after the contact's last inbound message. The rule is a pure
//! function of the last inbound time, the platform's window and "now".

use std::time::Duration;

use aina_core::{Conversation, ConversationId, Platform};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether free-form messages may be sent right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Free-form sends are allowed. `closes_at` is `None` when the platform
    /// does not restrict free-form sends.
    Open { closes_at: Option<DateTime<Utc>> },
    Closed,
}

impl WindowState {
    pub fn is_open(self) -> bool {
        matches!(self, WindowState::Open { .. })
    }
}

/// Evaluate the window at `now`.
///
/// Exactly `window` after the last inbound message is still open; any later
/// is closed. A conversation with no inbound message has no window to open.
pub fn evaluate(
    last_inbound_at: Option<DateTime<Utc>>,
    window: Option<Duration>,
    now: DateTime<Utc>,
) -> WindowState {
    let Some(window) = window else {
        return WindowState::Open { closes_at: None };
    };
    let Some(last_inbound_at) = last_inbound_at else {
        return WindowState::Closed;
    };
    // A window too large for chrono never closes.
    let Ok(window) = chrono::Duration::from_std(window) else {
        return WindowState::Open { closes_at: None };
    };
    let Some(closes_at) = last_inbound_at.checked_add_signed(window) else {
        return WindowState::Open { closes_at: None };
    };
    if now > closes_at {
        WindowState::Closed
    } else {
        WindowState::Open {
            closes_at: Some(closes_at),
        }
    }
}

/// Session state reported for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub conversation_id: ConversationId,
    pub platform: Platform,
    pub open: bool,
    pub closes_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn of(conversation: &Conversation, window: Option<Duration>, now: DateTime<Utc>) -> Self {
        let state = evaluate(conversation.last_inbound_at, window, now);
        let closes_at = match state {
            WindowState::Open { closes_at } => closes_at,
            WindowState::Closed => conversation
                .last_inbound_at
                .zip(window.and_then(|w| chrono::Duration::from_std(w).ok()))
                .and_then(|(at, w)| at.checked_add_signed(w)),
        };
        Self {
            conversation_id: conversation.id.clone(),
            platform: conversation.platform,
            open: state.is_open(),
            closes_at,
            last_inbound_at: conversation.last_inbound_at,
        }
    }
}
