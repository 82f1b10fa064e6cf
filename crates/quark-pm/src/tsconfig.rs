//! Compiler configuration (tsconfig.json)
//!
//! Only `compilerOptions.baseUrl` is read: it is the alias root that bare
//! specifiers are tried against before package lookup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the compiler configuration
pub const TSCONFIG_FILE: &str = "tsconfig.json";

/// Errors that can occur while reading a compiler configuration
#[derive(Debug, Error)]
pub enum TsConfigError {
    /// Failed to read the file
    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parsed compiler configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    #[serde(default)]
    pub compiler_options: CompilerOptions,
}

/// The subset of `compilerOptions` used for resolution
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Alias root, relative to the directory holding tsconfig.json
    #[serde(default)]
    pub base_url: Option<String>,
}

impl TsConfig {
    /// Load `tsconfig.json` from a directory
    ///
    /// Returns `Ok(None)` when the directory has no configuration file.
    pub fn from_dir(dir: &Path) -> Result<Option<Self>, TsConfigError> {
        let path = dir.join(TSCONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| TsConfigError::IoError {
            path: path.clone(),
            source,
        })?;
        let stripped = strip_comments(&content);
        serde_json::from_str(&stripped)
            .map(Some)
            .map_err(|source| TsConfigError::ParseError { path, source })
    }

    /// Absolute alias root for a configuration found in `dir`
    pub fn base_url(&self, dir: &Path) -> Option<PathBuf> {
        self.compiler_options
            .base_url
            .as_deref()
            .map(|base| crate::path::normalize(&dir.join(base)))
    }
}

/// Remove `//` and `/* */` comments outside of string literals
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_config() {
        let temp = tempfile::tempdir().unwrap();
        assert!(TsConfig::from_dir(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_base_url_is_absolute() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(TSCONFIG_FILE),
            r#"{ "compilerOptions": { "baseUrl": "./src", "strict": true } }"#,
        )
        .unwrap();

        let config = TsConfig::from_dir(temp.path()).unwrap().unwrap();
        assert_eq!(config.base_url(temp.path()), Some(temp.path().join("src")));
    }

    #[test]
    fn test_comments_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(TSCONFIG_FILE),
            "{\n  // alias root\n  \"compilerOptions\": { /* inline */ \"baseUrl\": \"lib//x\" }\n}",
        )
        .unwrap();

        let config = TsConfig::from_dir(temp.path()).unwrap().unwrap();
        assert_eq!(config.compiler_options.base_url.as_deref(), Some("lib//x"));
    }

    #[test]
    fn test_no_compiler_options() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(TSCONFIG_FILE), "{}").unwrap();

        let config = TsConfig::from_dir(temp.path()).unwrap().unwrap();
        assert_eq!(config.base_url(temp.path()), None);
    }
}
