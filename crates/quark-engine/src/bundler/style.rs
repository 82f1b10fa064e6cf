//! Scoped style modules
//!
//! Every class and id selector in a `*.module.css` file is prefixed with an id
//! derived from the file's path, so two modules can both define `.title`. The
//! original names become the module's exported tokens.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

static SELECTOR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.#][^\s.#,>+~:]*").expect("selector token pattern is valid"));

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment pattern is valid"));

/// At-rules whose blocks hold further style rules
const NESTED_AT_RULES: &[&str] = &["@media", "@supports"];

/// A processed style module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedStyle {
    /// Prefix applied to every selector token
    pub unique_id: String,
    /// Rewritten stylesheet
    pub css: String,
    /// Original token names, first-seen order
    pub tokens: Vec<String>,
}

/// Scope id for a style module: `a` + first 7 hex chars of the path hash
pub fn unique_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    format!("a{}", &hex::encode(digest)[..7])
}

/// Prefix every selector in `css` with `unique_id`
pub fn scope_stylesheet(css: &str, unique_id: &str) -> ScopedStyle {
    let source = COMMENT.replace_all(css, "");
    let mut out = String::with_capacity(source.len() + 64);
    let mut tokens = IndexSet::new();
    scope_block(&source, unique_id, &mut out, &mut tokens);

    ScopedStyle {
        unique_id: unique_id.to_string(),
        css: out,
        tokens: tokens.into_iter().collect(),
    }
}

/// The runtime call publishing a style module's tokens
///
/// ```text
/// dS("app/card.module.css","a1b2c3d",["title","active"]);
/// ```
pub fn style_define(full_module_name: &str, style: &ScopedStyle) -> String {
    format!(
        "dS({},{},{});",
        serde_json::Value::from(full_module_name),
        serde_json::Value::from(style.unique_id.as_str()),
        serde_json::Value::from(style.tokens.clone()),
    )
}

fn scope_block(css: &str, id: &str, out: &mut String, tokens: &mut IndexSet<String>) {
    let mut rest = css;

    while let Some(pos) = rest.find(['{', ';']) {
        if rest.as_bytes()[pos] == b';' {
            out.push_str(&rest[..=pos]);
            rest = &rest[pos + 1..];
            continue;
        }

        let Some(close) = matching_brace(rest, pos) else {
            break;
        };
        let prelude = &rest[..pos];
        let body = &rest[pos + 1..close];
        let at_rule = prelude.trim_start();

        if NESTED_AT_RULES.iter().any(|rule| at_rule.starts_with(rule)) {
            out.push_str(prelude);
            out.push('{');
            scope_block(body, id, out, tokens);
            out.push('}');
        } else if at_rule.starts_with('@') {
            out.push_str(&rest[..=close]);
        } else {
            out.push_str(&prefix_selector(prelude, id, tokens));
            out.push_str(&rest[pos..=close]);
        }

        rest = &rest[close + 1..];
    }

    out.push_str(rest);
}

fn prefix_selector(selector: &str, id: &str, tokens: &mut IndexSet<String>) -> String {
    for token in SELECTOR_TOKEN.find_iter(selector) {
        let name = &token.as_str()[1..];
        if !name.is_empty() {
            tokens.insert(name.to_string());
        }
    }

    let mut scoped = String::with_capacity(selector.len() + 16);
    for c in selector.chars() {
        scoped.push(c);
        if c == '.' || c == '#' {
            scoped.push_str(id);
            scoped.push('_');
        }
    }
    scoped
}

/// Index of the `}` closing the `{` at `open`
fn matching_brace(css: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;

    for (i, &b) in css.as_bytes().iter().enumerate().skip(open) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'{') => depth += 1,
            (None, b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_shape() {
        let id = unique_id(Path::new("/app/card.module.css"));
        assert_eq!(id.len(), 8);
        assert!(id.starts_with('a'));
        assert_eq!(id, unique_id(Path::new("/app/card.module.css")));
        assert_ne!(id, unique_id(Path::new("/app/list.module.css")));
    }

    #[test]
    fn test_class_and_id_tokens() {
        let style = scope_stylesheet(".foo { color: red; }\n#bar { margin: 0; }\n", "a1234567");
        assert_eq!(style.tokens, vec!["foo", "bar"]);
        assert!(style.css.contains(".a1234567_foo { color: red; }"));
        assert!(style.css.contains("#a1234567_bar { margin: 0; }"));
    }

    #[test]
    fn test_compound_selectors_dedupe() {
        let style = scope_stylesheet(".card > .title:hover, .card.active {}", "x");
        assert_eq!(style.tokens, vec!["card", "title", "active"]);
        assert_eq!(style.css, ".x_card > .x_title:hover, .x_card.x_active {}");
    }

    #[test]
    fn test_media_recurses_and_keyframes_copied() {
        let css = "@media (max-width: 600px) { .narrow { width: 50.5%; } }\n\
                   @keyframes spin { from { opacity: 0.5; } to { opacity: 1; } }\n\
                   @import url(\"reset.css\");";
        let style = scope_stylesheet(css, "x");
        assert_eq!(style.tokens, vec!["narrow"]);
        assert!(style.css.contains("@media (max-width: 600px) { .x_narrow { width: 50.5%; } }"));
        assert!(style.css.contains("@keyframes spin { from { opacity: 0.5; } to { opacity: 1; } }"));
        assert!(style.css.contains("@import url(\"reset.css\");"));
    }

    #[test]
    fn test_comments_dropped() {
        let style = scope_stylesheet("/* .ghost {} */ .real {}", "x");
        assert_eq!(style.tokens, vec!["real"]);
    }

    #[test]
    fn test_style_define_call() {
        let style = scope_stylesheet(".foo {} #bar {}", "a1234567");
        assert_eq!(
            style_define("app/card.module.css", &style),
            r#"dS("app/card.module.css","a1234567",["foo","bar"]);"#
        );
    }
}
