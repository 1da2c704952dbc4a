// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lowest to highest precedence: compiled defaults, `/etc/aina/aina.toml`,
//! `~/.config/aina/aina.toml`, `./aina.toml`, then `AINA_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AinaConfig;

/// Top-level tables that `AINA_<TABLE>_<KEY>` variables may target.
const SECTIONS: &[&str] = &[
    "server",
    "storage",
    "gateway",
    "webhook",
    "whatsapp",
    "messenger",
    "pricing",
    "dispatch",
    "realtime",
    "billing",
    "prometheus",
];

/// Config files searched by [`load_config`], lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/aina/aina.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("aina").join("aina.toml"));
    }
    paths.push(PathBuf::from("aina.toml"));
    paths
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(AinaConfig::default()))
}

/// Load from every file in [`search_paths`] plus env overrides.
/// Missing files are skipped.
pub fn load_config() -> Result<AinaConfig, figment::Error> {
    search_paths()
        .iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
        .extract()
}

/// Load defaults overlaid with one TOML document. No env overrides.
pub fn load_config_from_str(toml_content: &str) -> Result<AinaConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Load defaults, one explicit file, then env overrides.
pub fn load_config_from_path(path: &Path) -> Result<AinaConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// `AINA_WEBHOOK_APP_SECRET` -> `webhook.app_secret`.
///
/// Splitting on every underscore would break keys that contain one, so the
/// table prefix is matched against the known section names instead.
fn env_key(raw: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            raw.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| raw.to_string())
}

fn env_provider() -> Env {
    Env::prefixed("AINA_").map(|key| env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_keep_inner_underscores() {
        assert_eq!(env_key("webhook_app_secret"), "webhook.app_secret");
        assert_eq!(env_key("dispatch_timeout_secs"), "dispatch.timeout_secs");
        assert_eq!(env_key("server_log_level"), "server.log_level");
    }

    #[test]
    fn unknown_prefix_passes_through() {
        assert_eq!(env_key("colour"), "colour");
    }

    #[test]
    fn local_file_has_highest_file_precedence() {
        let paths = search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from("/etc/aina/aina.toml")));
        assert_eq!(paths.last(), Some(&PathBuf::from("aina.toml")));
    }
}
