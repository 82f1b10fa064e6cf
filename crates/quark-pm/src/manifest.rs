//! Package manifest parsing (package.json)
//!
//! Only the fields module resolution depends on are modelled; everything else in
//! the manifest is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of a package manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    ValidationError(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Package manifest (package.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageManifest {
    /// Package name (may be scoped: `@org/name`)
    #[serde(default)]
    pub name: Option<String>,

    /// Package version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Conditional export map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<Value>,

    /// Legacy ES module entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Legacy CommonJS entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Runtime dependencies
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Parse a manifest from a file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse the manifest of a package directory
    pub fn from_dir(dir: &Path) -> Result<Self, ManifestError> {
        Self::from_file(&dir.join(MANIFEST_FILE))
    }

    /// Parse a manifest from a string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: PackageManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    ///
    /// A manifest without a name is allowed (application roots often omit it),
    /// but a present name must be a valid package name.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if let Some(name) = &self.name {
            if !is_valid_package_name(name) {
                return Err(ManifestError::ValidationError(format!(
                    "Invalid package name: {}. Must contain only alphanumeric characters, '.', '-', '_', and an optional @scope/ prefix",
                    name
                )));
            }
        }
        Ok(())
    }

    /// The package name, or an error naming the missing field
    pub fn require_name(&self) -> Result<&str, ManifestError> {
        self.name
            .as_deref()
            .ok_or_else(|| ManifestError::MissingField("name".to_string()))
    }

    /// Legacy entry point: `module`, then `main`, then `index.js`
    pub fn legacy_entry(&self) -> &str {
        self.module
            .as_deref()
            .or(self.main.as_deref())
            .unwrap_or("index.js")
    }
}

/// Synthesized package name for projects without a usable manifest
///
/// Derived from the entry file so repeated builds of the same project agree.
pub fn fallback_package_name(entry: &Path) -> String {
    let digest = Sha256::digest(entry.to_string_lossy().as_bytes());
    format!("pkg_{}", &hex::encode(digest)[..7])
}

/// Validate a package name
fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    // Handle scoped packages (@org/package)
    if let Some(scoped) = name.strip_prefix('@') {
        return match scoped.split_once('/') {
            Some((org, pkg)) => is_valid_name_part(org) && is_valid_name_part(pkg),
            None => false,
        };
    }

    is_valid_name_part(name)
}

/// Validate a name part
fn is_valid_name_part(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = PackageManifest::from_str(r#"{ "name": "app" }"#).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("app"));
        assert!(manifest.exports.is_none());
        assert_eq!(manifest.legacy_entry(), "index.js");
    }

    #[test]
    fn test_parse_scoped_name() {
        let manifest = PackageManifest::from_str(r#"{ "name": "@acme/ui-kit" }"#).unwrap();
        assert_eq!(manifest.require_name().unwrap(), "@acme/ui-kit");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let result = PackageManifest::from_str(r#"{ "name": "@acme" }"#);
        assert!(matches!(result, Err(ManifestError::ValidationError(_))));

        let result = PackageManifest::from_str(r#"{ "name": "has space" }"#);
        assert!(matches!(result, Err(ManifestError::ValidationError(_))));
    }

    #[test]
    fn test_missing_name() {
        let manifest = PackageManifest::from_str(r#"{ "version": "1.0.0" }"#).unwrap();
        assert!(matches!(
            manifest.require_name(),
            Err(ManifestError::MissingField(_))
        ));
    }

    #[test]
    fn test_legacy_entry_prefers_module() {
        let manifest = PackageManifest::from_str(
            r#"{ "name": "lib", "main": "dist/index.cjs", "module": "dist/index.mjs" }"#,
        )
        .unwrap();
        assert_eq!(manifest.legacy_entry(), "dist/index.mjs");

        let manifest =
            PackageManifest::from_str(r#"{ "name": "lib", "main": "dist/index.cjs" }"#).unwrap();
        assert_eq!(manifest.legacy_entry(), "dist/index.cjs");
    }

    #[test]
    fn test_malformed_json() {
        let result = PackageManifest::from_str("{ name: ");
        assert!(matches!(result, Err(ManifestError::ParseError(_))));
    }

    #[test]
    fn test_fallback_package_name_is_stable() {
        let a = fallback_package_name(Path::new("/work/app/index.tsx"));
        let b = fallback_package_name(Path::new("/work/app/index.tsx"));
        let c = fallback_package_name(Path::new("/work/other/index.tsx"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("pkg_"));
        assert_eq!(a.len(), "pkg_".len() + 7);
    }
}
