//! Quark package metadata library
//!
//! This crate reads the package metadata the bundler needs, including:
//! - Package manifests (`package.json`): name, version, entry fields
//! - Conditional export maps (`exports`) with subpath patterns
//! - Path alias roots (`tsconfig.json` `compilerOptions.baseUrl`)
//! - Project root and `node_modules` discovery

pub mod exports;
pub mod manifest;
pub mod path;
pub mod tsconfig;

pub use exports::{resolve_export, ExportError, DEFAULT_CONDITIONS};
pub use manifest::{fallback_package_name, ManifestError, PackageManifest, MANIFEST_FILE};
pub use path::{
    find_package_root, find_project_root, node_modules_dirs, normalize, PackageRoot, NODE_MODULES,
};
pub use tsconfig::{TsConfig, TsConfigError};
