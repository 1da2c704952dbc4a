// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message credit prices.
//!
//! Prices are fixed per message kind and do not vary by tenant:
//! text 1, template 1.5, media 2, interactive (including flows) 1.

use aina_config::model::PricingConfig;
use aina_core::{Credits, MessageKind};

/// Credit cost of each message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTable {
    pub text: Credits,
    pub template: Credits,
    pub media: Credits,
    pub interactive: Credits,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            text: Credits::from_minor(100),
            template: Credits::from_minor(150),
            media: Credits::from_minor(200),
            interactive: Credits::from_minor(100),
        }
    }
}

impl PriceTable {
    /// Build from `[pricing]`. Values are rounded to the nearest hundredth;
    /// config validation has already rejected non-positive or sub-cent prices.
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            text: to_credits(config.text),
            template: to_credits(config.template),
            media: to_credits(config.media),
            interactive: to_credits(config.interactive),
        }
    }

    /// The cost of sending one message of `kind`.
    pub fn cost_of(&self, kind: MessageKind) -> Credits {
        match kind {
            MessageKind::Text => self.text,
            MessageKind::Template => self.template,
            MessageKind::Media => self.media,
            MessageKind::Interactive => self.interactive,
        }
    }
}

fn to_credits(units: f64) -> Credits {
    Credits::from_minor((units * 100.0).round() as i64)
}
