// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Aina messaging platform.
//!
//! Strict TOML (`deny_unknown_fields` everywhere) layered with `AINA_*`
//! environment overrides. Errors come back as miette diagnostics pointing at
//! the offending key, with a suggestion when the key looks like a typo.
//!
//! ```no_run
//! let config = match aina_config::load_and_validate() {
//!     Ok(config) => config,
//!     Err(errors) => {
//!         aina_config::render_errors(&errors);
//!         std::process::exit(1);
//!     }
//! };
//! println!("gateway on port {}", config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::AinaConfig;

/// Label used for source spans when the TOML came from a string.
pub const INLINE_SOURCE: &str = "<inline>";

/// Load from the file hierarchy, then validate.
pub fn load_and_validate() -> Result<AinaConfig, Vec<ConfigError>> {
    checked(loader::load_config(), read_search_paths)
}

/// Load from a TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<AinaConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![(INLINE_SOURCE.to_string(), toml_content.to_string())]
    })
}

/// Validate a loaded config, or turn the figment error into diagnostics.
/// Sources are only read when there is an error to point into.
fn checked(
    loaded: Result<AinaConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<AinaConfig, Vec<ConfigError>> {
    let config =
        loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// `(absolute path, content)` for every config file that exists.
fn read_search_paths() -> Vec<(String, String)> {
    let cwd = std::env::current_dir().ok();
    loader::search_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let shown = match &cwd {
                Some(cwd) if path.is_relative() => cwd.join(&path),
                _ => path,
            };
            Some((shown.display().to_string(), content))
        })
        .collect()
}
