//! File classification
//!
//! Maps a path to the kind of artifact it contributes to a bundle. Patterns are
//! checked in order, so scoped style modules win over plain stylesheets and
//! declaration files never count as scripts.

use std::path::{Path, PathBuf};

/// Kind of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `*.module.css` / `*.scoped.css`: selectors are prefixed and exported as tokens
    StyleModule,
    /// Any other `*.css`: copied into the stylesheet as-is
    GlobalStyle,
    /// `*.js`
    ScriptJs,
    /// `*.ts` (excluding `*.d.ts`)
    ScriptTs,
    /// `*.jsx`
    ScriptJsx,
    /// `*.tsx`
    ScriptTsx,
    /// `*.mjs`
    ScriptMjs,
    /// Anything else
    Other,
}

impl FileKind {
    /// Whether files of this kind are recursed into for further imports
    pub fn is_script(self) -> bool {
        matches!(
            self,
            FileKind::ScriptJs
                | FileKind::ScriptTs
                | FileKind::ScriptJsx
                | FileKind::ScriptTsx
                | FileKind::ScriptMjs
        )
    }

    /// Whether files of this kind contribute to the stylesheet
    pub fn is_style(self) -> bool {
        matches!(self, FileKind::StyleModule | FileKind::GlobalStyle)
    }

    /// Source-language sibling of a compiled-output kind
    fn source_fallback(self) -> Option<(FileKind, &'static str, &'static str)> {
        match self {
            FileKind::ScriptJs => Some((FileKind::ScriptTs, ".js", ".ts")),
            FileKind::ScriptJsx => Some((FileKind::ScriptTsx, ".jsx", ".tsx")),
            _ => None,
        }
    }
}

/// Extensions probed, in order, for extensionless specifiers
const PROBE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs"];

/// Classify a path by its name alone
pub fn classify(path: &Path) -> FileKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".module.css") || name.ends_with(".scoped.css") {
        FileKind::StyleModule
    } else if name.ends_with(".css") {
        FileKind::GlobalStyle
    } else if name.ends_with(".d.ts") {
        FileKind::Other
    } else if name.ends_with(".tsx") {
        FileKind::ScriptTsx
    } else if name.ends_with(".jsx") {
        FileKind::ScriptJsx
    } else if name.ends_with(".mjs") {
        FileKind::ScriptMjs
    } else if name.ends_with(".ts") {
        FileKind::ScriptTs
    } else if name.ends_with(".js") {
        FileKind::ScriptJs
    } else {
        FileKind::Other
    }
}

/// Locate the file a path refers to and classify it
///
/// Resolves against source rather than output: when a compiled `.js`/`.jsx` path
/// does not exist, its `.ts`/`.tsx` sibling is used. Extensionless paths probe
/// the script extensions, then `index.*` inside a directory. When nothing
/// matches, the original path is returned with its name-based kind.
pub fn locate(path: &Path) -> (PathBuf, FileKind) {
    let kind = classify(path);

    if path.is_file() {
        return (path.to_path_buf(), kind);
    }

    if let Some((source_kind, from, to)) = kind.source_fallback() {
        let name = path.to_string_lossy();
        let lower = name.to_lowercase();
        if lower.ends_with(from) {
            let sibling = PathBuf::from(format!("{}{}", &name[..name.len() - from.len()], to));
            if sibling.is_file() {
                return (sibling, source_kind);
            }
        }
        return (path.to_path_buf(), kind);
    }

    if kind == FileKind::Other {
        for ext in PROBE_EXTENSIONS {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                let kind = classify(&candidate);
                return (candidate, kind);
            }
        }

        if path.is_dir() {
            for ext in PROBE_EXTENSIONS {
                let candidate = path.join(format!("index.{}", ext));
                if candidate.is_file() {
                    let kind = classify(&candidate);
                    return (candidate, kind);
                }
            }
        }
    }

    (path.to_path_buf(), kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify_styles() {
        assert_eq!(classify(Path::new("card.module.css")), FileKind::StyleModule);
        assert_eq!(classify(Path::new("card.scoped.css")), FileKind::StyleModule);
        assert_eq!(classify(Path::new("reset.css")), FileKind::GlobalStyle);
        assert_eq!(classify(Path::new("RESET.CSS")), FileKind::GlobalStyle);
    }

    #[test]
    fn test_classify_scripts() {
        assert_eq!(classify(Path::new("a.js")), FileKind::ScriptJs);
        assert_eq!(classify(Path::new("a.ts")), FileKind::ScriptTs);
        assert_eq!(classify(Path::new("a.jsx")), FileKind::ScriptJsx);
        assert_eq!(classify(Path::new("a.tsx")), FileKind::ScriptTsx);
        assert_eq!(classify(Path::new("a.mjs")), FileKind::ScriptMjs);
        assert_eq!(classify(Path::new("a.d.ts")), FileKind::Other);
        assert_eq!(classify(Path::new("logo.svg")), FileKind::Other);
    }

    #[test]
    fn test_locate_prefers_existing_file() {
        let temp = TempDir::new().unwrap();
        let js = temp.path().join("util.js");
        fs::write(&js, "export const x = 1;").unwrap();
        fs::write(temp.path().join("util.ts"), "export const x = 1;").unwrap();

        assert_eq!(locate(&js), (js.clone(), FileKind::ScriptJs));
    }

    #[test]
    fn test_locate_falls_back_to_source() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("view.tsx"), "").unwrap();
        fs::write(temp.path().join("util.ts"), "").unwrap();

        assert_eq!(
            locate(&temp.path().join("view.jsx")),
            (temp.path().join("view.tsx"), FileKind::ScriptTsx)
        );
        assert_eq!(
            locate(&temp.path().join("util.js")),
            (temp.path().join("util.ts"), FileKind::ScriptTs)
        );
    }

    #[test]
    fn test_locate_probes_extensions_and_index() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("button.tsx"), "").unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("lib/index.ts"), "").unwrap();

        assert_eq!(
            locate(&temp.path().join("button")),
            (temp.path().join("button.tsx"), FileKind::ScriptTsx)
        );
        assert_eq!(
            locate(&temp.path().join("lib")),
            (temp.path().join("lib/index.ts"), FileKind::ScriptTs)
        );
    }

    #[test]
    fn test_locate_missing_keeps_path() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone.js");
        assert_eq!(locate(&missing), (missing.clone(), FileKind::ScriptJs));
    }
}
