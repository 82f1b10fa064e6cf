//! Static import/export specifier extraction
//!
//! The syntax-tree parser is pluggable through [`SourceParser`]. The bundled
//! [`StaticImportScanner`] recognizes the static forms without building a tree:
//!
//! ```text
//! import x from "./x";            import { a, b } from "pkg/sub";
//! import * as ns from "../ns";    import "./side-effect.css";
//! export * from "./all";          export { c } from "./c";
//! ```
//!
//! Dynamic `import()` calls and specifiers inside comments are not reported.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::is_framework_specifier;

/// Errors a source parser can report
#[derive(Debug, Error)]
pub enum SpecifierError {
    /// The source could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Syntax { path: PathBuf, message: String },
}

/// Yields the static specifiers of a source file, in source order
pub trait SourceParser: Send + Sync {
    /// Every static import/export specifier, in the order they appear
    fn specifiers(&self, path: &Path, source: &str) -> Result<Vec<String>, SpecifierError>;

    /// Specifiers that name other modules (the framework alias is skipped)
    fn dependencies(&self, path: &Path, source: &str) -> Result<Vec<String>, SpecifierError> {
        Ok(self
            .specifiers(path, source)?
            .into_iter()
            .filter(|s| !is_framework_specifier(s))
            .collect())
    }
}

static STATIC_SPECIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:import\s+(?:[\w*{}\s,$]+?\s+from\s+)?|export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+)["']([^"'\n]+)["']"#,
    )
    .expect("static specifier pattern is valid")
});

/// Regex-driven scanner for static import/export declarations
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticImportScanner;

impl StaticImportScanner {
    /// Create a new scanner
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for StaticImportScanner {
    fn specifiers(&self, _path: &Path, source: &str) -> Result<Vec<String>, SpecifierError> {
        let code = strip_comments(source);
        Ok(STATIC_SPECIFIER
            .captures_iter(&code)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect())
    }
}

/// Blank out comments, keeping string and template literals intact
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"' | '\'' | '`', _) => {
                quote = Some(c);
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
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}
