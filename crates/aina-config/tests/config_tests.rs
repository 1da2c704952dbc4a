// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Aina configuration system.

use aina_config::diagnostic::{ConfigError, suggest_key};
use aina_config::model::{AinaConfig, TimeoutPolicy, TokenRole};
use aina_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_aina_config() {
    let toml = r#"
[server]
log_level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[gateway]
host = "0.0.0.0"
port = 8080

[[gateway.tokens]]
token = "agent-token"
tenant_id = "acme"
actor_id = "priya"

[[gateway.tokens]]
token = "admin-token"
tenant_id = "ops"
role = "admin"
actor_id = "root"

[webhook]
verify_token = "hello"
app_secret = "shh"

[whatsapp]
api_base = "http://localhost:9999"

[messenger]
session_window_hours = 48

[pricing]
text = 0.5
template = 1.25

[dispatch]
timeout_secs = 5
max_retries = 0
on_timeout = "hold"

[realtime]
channel_capacity = 16
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.tokens.len(), 2);
    assert_eq!(config.gateway.tokens[0].role, TokenRole::Agent);
    assert_eq!(config.gateway.tokens[1].role, TokenRole::Admin);
    assert_eq!(config.webhook.verify_token.as_deref(), Some("hello"));
    assert_eq!(config.webhook.app_secret.as_deref(), Some("shh"));
    assert_eq!(config.whatsapp.api_base, "http://localhost:9999");
    assert_eq!(config.whatsapp.session_window_hours, Some(24));
    assert_eq!(config.messenger.session_window_hours, Some(48));
    assert_eq!(config.pricing.text, 0.5);
    assert_eq!(config.pricing.template, 1.25);
    assert_eq!(config.pricing.media, 2.0);
    assert_eq!(config.dispatch.timeout_secs, 5);
    assert_eq!(config.dispatch.max_retries, 0);
    assert_eq!(config.dispatch.on_timeout, TimeoutPolicy::Hold);
    assert_eq!(config.realtime.channel_capacity, 16);
}

/// Unknown field in [dispatch] produces an UnknownField error.
#[test]
fn unknown_field_in_dispatch_produces_error() {
    let toml = r#"
[dispatch]
timout_secs = 5
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("timout_secs"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unknown field inside a token table is rejected too.
#[test]
fn unknown_field_in_token_produces_error() {
    let toml = r#"
[[gateway.tokens]]
token = "x"
tenant_id = "t"
actor_id = "a"
scope = "all"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert_eq!(config.gateway.port, 3000);
    assert!(config.gateway.tokens.is_empty());
    assert!(config.webhook.app_secret.is_none());
    assert_eq!(config.dispatch.on_timeout, TimeoutPolicy::Refund);
    assert_eq!(config.billing.packs.len(), 3);
    assert!(config.prometheus.enabled);
}

/// `AINA_WEBHOOK_APP_SECRET` maps to `webhook.app_secret`, not `webhook.app.secret`.
#[test]
fn dotted_override_reaches_underscore_key() {
    use figment::{Figment, providers::Serialized};

    let config: AinaConfig = Figment::new()
        .merge(Serialized::defaults(AinaConfig::default()))
        .merge(("webhook.app_secret", "from-env"))
        .extract()
        .expect("should set app_secret via dot notation");

    assert_eq!(config.webhook.app_secret.as_deref(), Some("from-env"));
}

/// Later layers override earlier ones.
#[test]
fn later_layer_overrides_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let toml_content = r#"
[gateway]
port = 4000
"#;

    let config: AinaConfig = Figment::new()
        .merge(Serialized::defaults(AinaConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("gateway.port", 5000))
        .extract()
        .expect("should merge override");

    assert_eq!(config.gateway.port, 5000);
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: AinaConfig = Figment::new()
        .merge(Serialized::defaults(AinaConfig::default()))
        .merge(Toml::file("/nonexistent/path/aina.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.gateway.port, 3000);
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unknown key "app_secert" in [webhook] suggests "app_secret".
#[test]
fn diagnostic_suggests_app_secret() {
    let valid_keys = &["verify_token", "app_secret"];
    assert_eq!(
        suggest_key("app_secert", valid_keys),
        Some("app_secret".to_string())
    );
}

/// Error output from load_and_validate_str includes the unknown key name and suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[webhook]
app_secert = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "app_secert"
                && suggestion.as_deref() == Some("app_secret")
                && valid_keys.contains("verify_token")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error with suggestion, got: {errors:?}"
    );
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { section, span: Some(_), .. } if section == "webhook"
    )));
}

/// Invalid type (string where number expected) produces clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[gateway]
port = "not_a_number"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// Unknown timeout policy is a type error, not a silent default.
#[test]
fn unknown_timeout_policy_rejected() {
    let toml = r#"
[dispatch]
on_timeout = "retry-forever"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// ConfigError can be rendered using miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "timout_secs".to_string(),
        section: "dispatch".to_string(),
        suggestion: Some("timeout_secs".to_string()),
        valid_keys: "timeout_secs, max_retries".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `timeout_secs`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("dispatch.timout_secs"));
}

/// Validation errors surface through load_and_validate_str.
#[test]
fn validation_catches_negative_price() {
    let toml = r#"
[pricing]
media = -2.0
"#;

    let errors = load_and_validate_str(toml).expect_err("negative price should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("pricing.media"))
    });
    assert!(has_validation_error, "should have validation error for negative price");
}

/// Configured packs replace the defaults.
#[test]
fn custom_packs_replace_defaults() {
    let toml = r#"
[[billing.packs]]
id = "tiny"
name = "Tiny"
credits = 10
price_inr = 9
"#;

    let config = load_and_validate_str(toml).expect("valid packs");
    assert_eq!(config.billing.packs.len(), 1);
    assert_eq!(config.billing.packs[0].id, "tiny");
    assert!(!config.billing.packs[0].popular);
}
