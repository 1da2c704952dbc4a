// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, positive prices, and unique API tokens.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::AinaConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &AinaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let prices = [
        ("text", config.pricing.text),
        ("template", config.pricing.template),
        ("media", config.pricing.media),
        ("interactive", config.pricing.interactive),
    ];
    for (kind, price) in prices {
        if !price.is_finite() || price <= 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("pricing.{kind} must be a positive amount, got {price}"),
            });
        } else if ((price * 100.0).round() - price * 100.0).abs() > 1e-9 {
            errors.push(ConfigError::Validation {
                message: format!("pricing.{kind} allows at most two decimal places, got {price}"),
            });
        }
    }

    if config.dispatch.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.realtime.channel_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "realtime.channel_capacity must be at least 1".to_string(),
        });
    }

    if config.server.ingest_queue_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "server.ingest_queue_capacity must be at least 1".to_string(),
        });
    }

    for (section, hours) in [
        ("whatsapp", config.whatsapp.session_window_hours),
        ("messenger", config.messenger.session_window_hours),
    ] {
        if hours == Some(0) {
            errors.push(ConfigError::Validation {
                message: format!("{section}.session_window_hours must be at least 1 when set"),
            });
        }
    }

    let mut seen_tokens = HashSet::new();
    for (i, token) in config.gateway.tokens.iter().enumerate() {
        if token.token.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("gateway.tokens[{i}].token must not be empty"),
            });
        } else if !seen_tokens.insert(token.token.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("gateway.tokens[{i}] duplicates an earlier token"),
            });
        }
        if token.tenant_id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("gateway.tokens[{i}].tenant_id must not be empty"),
            });
        }
    }

    let mut seen_packs = HashSet::new();
    for pack in &config.billing.packs {
        if !seen_packs.insert(pack.id.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate credit pack id `{}` in [[billing.packs]]", pack.id),
            });
        }
        if pack.credits <= 0 || pack.price_inr <= 0 {
            errors.push(ConfigError::Validation {
                message: format!(
                    "credit pack `{}` must have positive credits and price",
                    pack.id
                ),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
