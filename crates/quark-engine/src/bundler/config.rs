//! Project configuration (quark.toml)
//!
//! Every field is optional. Relative paths are resolved against the directory
//! holding the configuration file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use quark_pm::{fallback_package_name, find_project_root, PackageManifest, TsConfig};

use crate::module::ModuleLocation;

/// File name of the project configuration
pub const CONFIG_FILE: &str = "quark.toml";

/// Process variables with this prefix are injected into the bundle
pub const ENV_PREFIX: &str = "QUARK_APP_";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuarkConfig {
    /// Bundle settings
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Hot-reload server settings
    #[serde(default)]
    pub reload: ReloadConfig,
}

/// Bundle settings (`[bundle]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleConfig {
    /// Entry file (default: "index.tsx")
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    /// Script artifact (default: "quark.js")
    #[serde(default = "default_out_script")]
    pub out_script: PathBuf,

    /// Stylesheet artifact (default: "quark.css")
    #[serde(default = "default_out_style")]
    pub out_style: PathBuf,

    /// Application package name (default: package.json name, else a hash)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    /// Log every emitted file
    #[serde(default)]
    pub verbose: bool,

    /// Extra environment passed to the application
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Hot-reload server settings (`[reload]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReloadConfig {
    /// Bind address (default: "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port (default: 1337)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log every broadcast message
    #[serde(default)]
    pub verbose: bool,
}

fn default_entry() -> PathBuf {
    PathBuf::from("index.tsx")
}

fn default_out_script() -> PathBuf {
    PathBuf::from("quark.js")
}

fn default_out_style() -> PathBuf {
    PathBuf::from("quark.css")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1337
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            out_script: default_out_script(),
            out_style: default_out_style(),
            package_name: None,
            verbose: false,
            env: BTreeMap::new(),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verbose: false,
        }
    }
}

impl QuarkConfig {
    /// Parse configuration from a file, resolving paths against its directory
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&content)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        config.bundle.resolve_paths(dir);
        Ok(config)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: QuarkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `quark.toml` from `dir`, or defaults rooted at `dir` when absent
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            return Self::from_file(&path);
        }
        let mut config = Self::default();
        config.bundle.resolve_paths(dir);
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bundle.entry.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("bundle.entry cannot be empty".to_string()));
        }
        if self.bundle.out_script == self.bundle.out_style {
            return Err(ConfigError::ValidationError(
                "bundle.out_script and bundle.out_style must differ".to_string(),
            ));
        }
        if matches!(&self.bundle.package_name, Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "bundle.package_name cannot be empty".to_string(),
            ));
        }
        if self.reload.host.is_empty() {
            return Err(ConfigError::ValidationError("reload.host cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl BundleConfig {
    /// Bundle settings for one entry file, everything else defaulted
    pub fn for_entry(entry: impl Into<PathBuf>) -> Self {
        let entry = entry.into();
        let dir = entry.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            out_script: dir.join(default_out_script()),
            out_style: dir.join(default_out_style()),
            entry,
            ..Self::default()
        }
    }

    fn resolve_paths(&mut self, dir: &Path) {
        for path in [&mut self.entry, &mut self.out_script, &mut self.out_style] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    /// Directory holding the application's package.json (entry dir when none)
    pub fn project_root(&self) -> PathBuf {
        let entry_dir = self.entry.parent().unwrap_or(Path::new("."));
        find_project_root(entry_dir).unwrap_or_else(|| entry_dir.to_path_buf())
    }

    /// Application package name
    ///
    /// Configured name, then the project's package.json `name`, then a name
    /// derived from the entry path.
    pub fn package_name(&self) -> String {
        if let Some(name) = &self.package_name {
            return name.clone();
        }

        let root = self.project_root();
        match PackageManifest::from_dir(&root) {
            Ok(PackageManifest { name: Some(name), .. }) => name,
            Ok(_) => fallback_package_name(&self.entry),
            Err(e) => {
                if root.join(quark_pm::MANIFEST_FILE).exists() {
                    warn!(error = %e, "unreadable package.json, deriving package name from entry");
                }
                fallback_package_name(&self.entry)
            }
        }
    }

    /// Location of the entry file, with the project's alias root
    pub fn entry_location(&self) -> ModuleLocation {
        let root = self.project_root();
        let base_url = match TsConfig::from_dir(&root) {
            Ok(config) => config.and_then(|c| c.base_url(&root)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable tsconfig.json");
                None
            }
        };
        ModuleLocation::entry(self.entry.clone(), self.package_name(), base_url)
    }

    /// Environment passed to the application
    ///
    /// `QUARK_APP_*` process variables, overridden by configured `env` entries.
    pub fn environment(&self) -> BTreeMap<String, String> {
        collect_env(std::env::vars(), &self.env)
    }
}

fn collect_env(
    vars: impl Iterator<Item = (String, String)>,
    configured: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = vars.filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect();
    env.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[bundle]
entry = "src/main.tsx"
out_script = "dist/app.js"
out_style = "dist/app.css"
package_name = "my-app"
verbose = true

[bundle.env]
API_URL = "https://example.test"

[reload]
host = "0.0.0.0"
port = 4000
"#;
        let config = QuarkConfig::from_str(toml).unwrap();
        assert_eq!(config.bundle.entry, PathBuf::from("src/main.tsx"));
        assert_eq!(config.bundle.package_name.as_deref(), Some("my-app"));
        assert!(config.bundle.verbose);
        assert_eq!(config.bundle.env["API_URL"], "https://example.test");
        assert_eq!(config.reload.port, 4000);
        assert!(!config.reload.verbose);
    }

    #[test]
    fn test_defaults() {
        let config = QuarkConfig::from_str("").unwrap();
        assert_eq!(config.bundle.entry, PathBuf::from("index.tsx"));
        assert_eq!(config.bundle.out_script, PathBuf::from("quark.js"));
        assert_eq!(config.bundle.out_style, PathBuf::from("quark.css"));
        assert_eq!(config.reload.host, "127.0.0.1");
        assert_eq!(config.reload.port, 1337);
    }

    #[test]
    fn test_validation() {
        let result = QuarkConfig::from_str("[bundle]\nout_script = \"a\"\nout_style = \"a\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = QuarkConfig::from_str("[bundle]\npackage_name = \"  \"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[bundle]\nentry = \"src/index.tsx\"\n").unwrap();

        let config = QuarkConfig::discover(temp.path()).unwrap();
        assert_eq!(config.bundle.entry, temp.path().join("src/index.tsx"));
        assert_eq!(config.bundle.out_script, temp.path().join("quark.js"));
    }

    #[test]
    fn test_package_name_discovery() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("src/index.tsx");
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let config = BundleConfig::for_entry(&entry);
        assert!(config.package_name().starts_with("pkg_"));

        fs::write(temp.path().join("package.json"), r#"{ "name": "storefront" }"#).unwrap();
        assert_eq!(config.package_name(), "storefront");

        let named = BundleConfig {
            package_name: Some("override".to_string()),
            ..config
        };
        assert_eq!(named.package_name(), "override");
    }

    #[test]
    fn test_environment_prefix_and_override() {
        let vars = vec![
            ("QUARK_APP_MODE".to_string(), "dev".to_string()),
            ("QUARK_APP_API".to_string(), "from-process".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let mut configured = BTreeMap::new();
        configured.insert("QUARK_APP_API".to_string(), "from-config".to_string());

        let env = collect_env(vars.into_iter(), &configured);
        assert_eq!(env.len(), 2);
        assert_eq!(env["QUARK_APP_MODE"], "dev");
        assert_eq!(env["QUARK_APP_API"], "from-config");
    }
}
