//! Conditional export map resolution
//!
//! Resolves a package subpath against the `exports` field of a manifest:
//! - `"exports": "./index.js"` (root only)
//! - `"exports": { "import": ..., "default": ... }` (conditions for the root)
//! - `"exports": { ".": ..., "./feature": ..., "./utils/*": "./src/utils/*.js" }`
//!
//! Condition objects are walked in manifest order and the first key present in
//! the accepted condition list wins. Arrays are fallbacks tried in order, and a
//! `null` target blocks the subpath.

use serde_json::Value;
use thiserror::Error;

/// Conditions accepted when bundling for a browser host
pub const DEFAULT_CONDITIONS: &[&str] = &["browser", "import", "module", "default"];

/// Errors that can occur while resolving an export map
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExportError {
    /// The export map does not list the subpath
    #[error("Subpath '{0}' is not exported by the package")]
    SubpathNotExported(String),

    /// The subpath is listed but no accepted condition matched
    #[error("No export condition matched for '{subpath}' (accepted: {conditions:?})")]
    UnmetCondition {
        subpath: String,
        conditions: Vec<String>,
    },

    /// The subpath is explicitly blocked with a `null` target
    #[error("Subpath '{0}' is blocked by the export map")]
    Blocked(String),

    /// A target does not start with `./`
    #[error("Invalid export target: {0}")]
    InvalidTarget(String),
}

/// Resolve `subpath` (empty for the package root) to a package-relative target
///
/// # Arguments
/// * `exports` - The manifest's `exports` value
/// * `subpath` - Specifier remainder past the package name, without leading `./`
/// * `conditions` - Accepted conditions
///
/// # Returns
/// The target as written in the manifest, e.g. `./dist/index.mjs`
pub fn resolve_export(
    exports: &Value,
    subpath: &str,
    conditions: &[&str],
) -> Result<String, ExportError> {
    let key = if subpath.is_empty() {
        ".".to_string()
    } else {
        format!("./{}", subpath.trim_start_matches("./"))
    };

    match exports {
        Value::Object(map) if map.keys().all(|k| k.starts_with('.')) => {
            if let Some(target) = map.get(&key) {
                return resolve_target(target, &key, conditions, None);
            }

            // Subpath patterns: the longest matching prefix wins
            let mut best: Option<(&str, &Value, String)> = None;
            for (pattern, target) in map {
                let Some((prefix, suffix)) = pattern.split_once('*') else {
                    continue;
                };
                if key.len() < prefix.len() + suffix.len()
                    || !key.starts_with(prefix)
                    || !key.ends_with(suffix)
                {
                    continue;
                }
                let capture = key[prefix.len()..key.len() - suffix.len()].to_string();
                if best.as_ref().map_or(true, |(p, _, _)| prefix.len() > p.len()) {
                    best = Some((prefix, target, capture));
                }
            }

            match best {
                Some((_, target, capture)) => {
                    resolve_target(target, &key, conditions, Some(&capture))
                }
                None => Err(ExportError::SubpathNotExported(key)),
            }
        }
        _ if key == "." => resolve_target(exports, &key, conditions, None),
        _ => Err(ExportError::SubpathNotExported(key)),
    }
}

fn resolve_target(
    target: &Value,
    key: &str,
    conditions: &[&str],
    capture: Option<&str>,
) -> Result<String, ExportError> {
    match target {
        Value::String(s) => {
            if !s.starts_with("./") {
                return Err(ExportError::InvalidTarget(s.clone()));
            }
            Ok(match capture {
                Some(capture) => s.replace('*', capture),
                None => s.clone(),
            })
        }
        Value::Object(map) => {
            for (condition, nested) in map {
                if !conditions.contains(&condition.as_str()) {
                    continue;
                }
                match resolve_target(nested, key, conditions, capture) {
                    Ok(resolved) => return Ok(resolved),
                    Err(ExportError::UnmetCondition { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }
            Err(ExportError::UnmetCondition {
                subpath: key.to_string(),
                conditions: conditions.iter().map(|c| c.to_string()).collect(),
            })
        }
        Value::Array(items) => {
            let mut last = None;
            for item in items {
                match resolve_target(item, key, conditions, capture) {
                    Ok(resolved) => return Ok(resolved),
                    Err(e) => last = Some(e),
                }
            }
            Err(last.unwrap_or_else(|| ExportError::SubpathNotExported(key.to_string())))
        }
        Value::Null => Err(ExportError::Blocked(key.to_string())),
        other => Err(ExportError::InvalidTarget(other.to_string())),
    }
}
