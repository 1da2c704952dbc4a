// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Deserialization failures are turned into diagnostics that point at the
//! offending line of `aina.toml`, list the keys the section accepts and,
//! for near misses, suggest the intended key (Jaro-Winkler similarity).

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// Catches typos like `app_secert` -> `app_secret`.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{}`", qualified(section, key))]
    #[diagnostic(
        code(aina::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted table path the key appeared in; empty at top level.
        section: String,
        suggestion: Option<String>,
        /// Comma-separated keys the table accepts.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(aina::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{}`", qualified(section, key))]
    #[diagnostic(
        code(aina::config::missing_key),
        help("add `{key} = <value>` to your aina.toml")
    )]
    MissingKey { key: String, section: String },

    /// Post-deserialization check failed (see `validation`).
    #[error("validation error: {message}")]
    #[diagnostic(code(aina::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(aina::config::other))]
    Other(String),
}

fn qualified(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{section}.{key}")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a (possibly multi-error) `figment::Error` into diagnostics.
///
/// `toml_sources` holds `(path, content)` pairs used to attach source spans.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let section = error.path.join(".");
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let table = enclosing_table(&error.path, field);
                    let (span, src) = locate(&error, table, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        section: table.join("."),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                    section,
                },
                Kind::InvalidType(actual, expected)
                | Kind::InvalidValue(actual, expected) => {
                    // The path ends with the key itself.
                    let (span, src) = match error.path.split_last() {
                        Some((key, parent)) => locate(&error, parent, key, toml_sources),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: section,
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Table holding `field`. Figment reports unknown keys with the key itself
/// as the last path segment; other errors stop at the table.
fn enclosing_table<'a>(path: &'a [String], field: &str) -> &'a [String] {
    match path.split_last() {
        Some((last, parent)) if last == field => parent,
        _ => path,
    }
}

/// Span of `field` inside the source the error came from.
///
/// Tables present in the compiled defaults keep the defaults' metadata after
/// merging, so the reported origin is only a preference: every loaded source
/// is searched, the named one first, later (higher precedence) files next.
fn locate(
    error: &FigmentError,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => crate::INLINE_SOURCE.to_string(),
    };
    let named = toml_sources.iter().filter(|(path, _)| *path == origin);
    let others = toml_sources.iter().rev().filter(|(path, _)| *path != origin);
    named
        .chain(others)
        .find_map(|(path, content)| {
            let offset = find_key_offset(content, section, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field` at the start of a line inside the table `path`.
///
/// `path = ["gateway", "tokens"]` matches both `[gateway.tokens]` and
/// `[[gateway.tokens]]` (first occurrence). An empty path searches only the
/// top of the file, before the first table header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let mut in_table = path.is_empty();
    // Array-of-tables elements show up as numeric segments.
    let wanted = path
        .iter()
        .filter(|segment| segment.parse::<usize>().is_err())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(".");
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            if in_table && !path.is_empty() {
                // Left the wanted table without finding the key.
                return None;
            }
            let name = trimmed.trim_matches(|c| c == '[' || c == ']').trim();
            in_table = !path.is_empty() && name == wanted;
            if path.is_empty() {
                return None;
            }
        } else if in_table {
            let indent = line.len() - line.trim_start().len();
            let rest = &line[indent..];
            if let Some(after) = rest.strip_prefix(field) {
                if after.trim_start().starts_with('=') {
                    return Some(offset + indent);
                }
            }
        }
        offset += line.len();
    }
    None
}

/// Closest valid key above the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
