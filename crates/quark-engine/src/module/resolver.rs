//! Module path resolution
//!
//! Handles resolving import specifiers to absolute file paths, owning packages and
//! normalized module names.
//!
//! # Resolution Order
//! For `import { x } from "<specifier>"`:
//! 1. Relative (`./`, `../`): joined onto the importing file's directory
//! 2. Alias root: tried against the package's `baseUrl` when one is configured
//! 3. Package exports: the owning package is found under `node_modules` and the
//!    remainder is resolved through its export map (or legacy entry fields)
//! 4. Otherwise the specifier does not resolve

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use quark_pm::{
    find_package_root, node_modules_dirs, normalize, resolve_export, ExportError, ManifestError,
    PackageManifest, TsConfig, DEFAULT_CONDITIONS,
};

use super::classify::locate;
use super::path::{dirname, full_module_name, normalize_module_name, sum_path};

/// Errors that can occur during module resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Relative file not found
    #[error("Module not found: {specifier} (tried: {tried})")]
    ModuleNotFound { specifier: String, tried: PathBuf },

    /// No package manifest found along the specifier path
    #[error("Package not found for '{0}' in any node_modules directory")]
    PackageNotFound(String),

    /// Export map rejected the subpath
    #[error("Cannot resolve '{specifier}': {source}")]
    Export {
        specifier: String,
        #[source]
        source: ExportError,
    },

    /// Package manifest could not be read
    #[error("Invalid manifest for '{specifier}': {source}")]
    Manifest {
        specifier: String,
        #[source]
        source: ManifestError,
    },

    /// The file the package points at does not exist
    #[error("Package entry not found for '{specifier}': {path}")]
    EntryNotFound { specifier: String, path: PathBuf },
}

/// Where a module lives, from the bundler's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLocation {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Name of the owning package
    pub package_name: String,
    /// Normalized module name inside the package
    pub module_name: String,
    /// Directory module names are relative to (entry dir or package root)
    pub package_dir: PathBuf,
    /// Alias root for bare specifiers inside this package
    pub base_url: Option<PathBuf>,
}

impl ModuleLocation {
    /// Location of an application entry file
    ///
    /// The entry's directory becomes the package directory, so the entry's module
    /// name is its file stem (`index.tsx` → `index`).
    pub fn entry(path: PathBuf, package_name: impl Into<String>, base_url: Option<PathBuf>) -> Self {
        let path = normalize(&path);
        let package_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let module_name = module_name_in(&package_dir, &path);
        Self {
            path,
            package_name: package_name.into(),
            module_name,
            package_dir,
            base_url,
        }
    }

    /// `package/module` address of this location
    pub fn full_module_name(&self) -> String {
        full_module_name(&self.package_name, &self.module_name)
    }
}

/// Module name of `path` relative to `package_dir`
///
/// A path outside `package_dir` is named the way a relative import reaching it
/// is: leading `..` segments are dropped, never the absolute prefix kept.
pub(crate) fn module_name_in(package_dir: &Path, path: &Path) -> String {
    let base: Vec<Component<'_>> = package_dir.components().collect();
    let target: Vec<Component<'_>> = path.components().collect();
    let shared = base.iter().zip(&target).take_while(|(a, b)| a == b).count();

    let relative: Vec<String> = target[shared..]
        .iter()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    normalize_module_name(&relative.join("/"))
}

/// Module resolver for import specifiers
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Accepted export-map conditions
    conditions: Vec<&'static str>,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver {
    /// Create a resolver accepting the browser condition set
    pub fn new() -> Self {
        Self {
            conditions: DEFAULT_CONDITIONS.to_vec(),
        }
    }

    /// Create a resolver with an explicit condition set
    pub fn with_conditions(conditions: Vec<&'static str>) -> Self {
        Self { conditions }
    }

    /// Resolve an import specifier relative to the importing module
    ///
    /// # Arguments
    /// * `specifier` - The import specifier (e.g., "./utils", "lib/feature")
    /// * `from` - Location of the module containing the import statement
    pub fn resolve(&self, specifier: &str, from: &ModuleLocation) -> Result<ModuleLocation, ResolveError> {
        if specifier.starts_with('.') {
            return self.resolve_relative(specifier, from);
        }

        if let Some(base_url) = &from.base_url {
            if let Some(resolved) = self.resolve_alias(specifier, from, base_url) {
                return Ok(resolved);
            }
        }

        self.resolve_package(specifier, from)
    }

    /// Resolve a relative import (./path or ../path)
    fn resolve_relative(&self, specifier: &str, from: &ModuleLocation) -> Result<ModuleLocation, ResolveError> {
        let from_dir = from.path.parent().unwrap_or(Path::new(""));
        let candidate = normalize(&from_dir.join(specifier));
        let (path, _) = locate(&candidate);

        if !path.exists() {
            return Err(ResolveError::ModuleNotFound {
                specifier: specifier.to_string(),
                tried: candidate,
            });
        }

        let module_name = sum_path(dirname(&from.module_name), specifier);
        debug!(specifier, module = %module_name, path = %path.display(), "resolved relative import");

        Ok(ModuleLocation {
            path,
            package_name: from.package_name.clone(),
            module_name,
            package_dir: from.package_dir.clone(),
            base_url: from.base_url.clone(),
        })
    }

    /// Resolve against the package's alias root; `None` falls through to packages
    fn resolve_alias(&self, specifier: &str, from: &ModuleLocation, base_url: &Path) -> Option<ModuleLocation> {
        let (path, _) = locate(&normalize(&base_url.join(specifier)));
        if !path.is_file() {
            return None;
        }

        // Named after the specifier: the linker looks bare specifiers up as `<package>/<specifier>`
        let module_name = normalize_module_name(specifier);
        debug!(specifier, module = %module_name, path = %path.display(), "resolved alias import");

        Some(ModuleLocation {
            path,
            package_name: from.package_name.clone(),
            module_name,
            package_dir: from.package_dir.clone(),
            base_url: from.base_url.clone(),
        })
    }

    /// Resolve a bare specifier through installed packages
    fn resolve_package(&self, specifier: &str, from: &ModuleLocation) -> Result<ModuleLocation, ResolveError> {
        let from_dir = from.path.parent().unwrap_or(Path::new(""));
        let root = node_modules_dirs(from_dir)
            .iter()
            .find_map(|node_modules| find_package_root(node_modules, specifier))
            .ok_or_else(|| ResolveError::PackageNotFound(specifier.to_string()))?;

        let manifest = PackageManifest::from_dir(&root.dir).map_err(|source| ResolveError::Manifest {
            specifier: specifier.to_string(),
            source,
        })?;
        let package_name = manifest
            .require_name()
            .map_err(|source| ResolveError::Manifest {
                specifier: specifier.to_string(),
                source,
            })?
            .to_string();

        let target = match &manifest.exports {
            Some(exports) => resolve_export(exports, &root.subpath, &self.conditions).map_err(|source| {
                ResolveError::Export {
                    specifier: specifier.to_string(),
                    source,
                }
            })?,
            None if root.subpath.is_empty() => manifest.legacy_entry().to_string(),
            None => root.subpath.clone(),
        };

        let (path, _) = locate(&normalize(&root.dir.join(&target)));
        if !path.is_file() {
            return Err(ResolveError::EntryNotFound {
                specifier: specifier.to_string(),
                path,
            });
        }

        let module_name = match normalize_module_name(&root.subpath) {
            name if name.is_empty() => "index".to_string(),
            name => name,
        };

        // A broken tsconfig in a dependency only costs the dependency its aliases
        let base_url = match TsConfig::from_dir(&root.dir) {
            Ok(config) => config.and_then(|c| c.base_url(&root.dir)),
            Err(e) => {
                tracing::warn!(package = %package_name, error = %e, "ignoring unreadable tsconfig");
                None
            }
        };

        debug!(specifier, package = %package_name, module = %module_name, path = %path.display(), "resolved package import");

        Ok(ModuleLocation {
            path,
            package_name,
            module_name,
            package_dir: root.dir,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> (TempDir, ModuleLocation) {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.tsx"), "").unwrap();
        let entry = ModuleLocation::entry(src.join("index.tsx"), "app", None);
        (temp_dir, entry)
    }

    #[test]
    fn test_entry_location() {
        let (temp_dir, entry) = create_test_project();
        assert_eq!(entry.module_name, "index");
        assert_eq!(entry.package_dir, temp_dir.path().join("src"));
        assert_eq!(entry.full_module_name(), "app/index");
    }

    #[test]
    fn test_resolve_relative_with_module_name() {
        let (temp_dir, entry) = create_test_project();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("components")).unwrap();
        fs::write(src.join("components/button.tsx"), "").unwrap();

        let resolver = ModuleResolver::new();
        let button = resolver.resolve("./components/button", &entry).unwrap();
        assert_eq!(button.path, src.join("components/button.tsx"));
        assert_eq!(button.module_name, "components/button");
        assert_eq!(button.package_name, "app");

        fs::create_dir_all(src.join("utils")).unwrap();
        fs::write(src.join("utils/format.ts"), "").unwrap();
        let format = resolver.resolve("../utils/format.js", &button).unwrap();
        assert_eq!(format.path, src.join("utils/format.ts"));
        assert_eq!(format.module_name, "utils/format");
    }

    #[test]
    fn test_resolve_relative_missing() {
        let (_temp_dir, entry) = create_test_project();
        let result = ModuleResolver::new().resolve("./missing", &entry);
        assert!(matches!(result, Err(ResolveError::ModuleNotFound { .. })));
    }

    #[test]
    fn test_resolve_alias_then_package() {
        let (temp_dir, mut entry) = create_test_project();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("shared")).unwrap();
        fs::write(src.join("shared/theme.ts"), "").unwrap();
        entry.base_url = Some(src.clone());

        let resolver = ModuleResolver::new();
        let theme = resolver.resolve("shared/theme", &entry).unwrap();
        assert_eq!(theme.path, src.join("shared/theme.ts"));
        assert_eq!(theme.module_name, "shared/theme");
        assert_eq!(theme.package_name, "app");

        // Alias root above the entry directory: the name still follows the specifier
        let (root_dir, mut rooted) = create_test_project();
        rooted.base_url = Some(root_dir.path().to_path_buf());
        fs::create_dir_all(root_dir.path().join("src/shared")).unwrap();
        fs::write(root_dir.path().join("src/shared/theme.ts"), "").unwrap();
        let theme = resolver.resolve("src/shared/theme", &rooted).unwrap();
        assert_eq!(theme.module_name, "src/shared/theme");

        // Not under the alias root: falls through to package lookup
        let result = resolver.resolve("colors", &entry);
        assert!(matches!(result, Err(ResolveError::PackageNotFound(_))));
    }

    #[test]
    fn test_resolve_package_exports() {
        let (temp_dir, entry) = create_test_project();
        let pkg = temp_dir.path().join("node_modules/colors");
        fs::create_dir_all(pkg.join("esm")).unwrap();
        fs::write(
            pkg.join("package.json"),
            r#"{ "name": "colors", "exports": { ".": "./esm/index.js", "./palette": { "import": "./esm/palette.js" } } }"#,
        )
        .unwrap();
        fs::write(pkg.join("esm/index.js"), "").unwrap();
        fs::write(pkg.join("esm/palette.js"), "").unwrap();

        let resolver = ModuleResolver::new();
        let root = resolver.resolve("colors", &entry).unwrap();
        assert_eq!(root.path, pkg.join("esm/index.js"));
        assert_eq!(root.package_name, "colors");
        assert_eq!(root.module_name, "index");
        assert_eq!(root.package_dir, pkg);

        let palette = resolver.resolve("colors/palette", &entry).unwrap();
        assert_eq!(palette.path, pkg.join("esm/palette.js"));
        assert_eq!(palette.full_module_name(), "colors/palette");
    }

    #[test]
    fn test_resolve_package_legacy_module_field() {
        let (temp_dir, entry) = create_test_project();
        let pkg = temp_dir.path().join("node_modules/old");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(pkg.join("package.json"), r#"{ "name": "old", "module": "dist/old.mjs" }"#).unwrap();
        fs::write(pkg.join("dist/old.mjs"), "").unwrap();

        let resolved = ModuleResolver::new().resolve("old", &entry).unwrap();
        assert_eq!(resolved.path, pkg.join("dist/old.mjs"));
    }

    #[test]
    fn test_resolve_package_carries_its_alias_root() {
        let (temp_dir, entry) = create_test_project();
        let pkg = temp_dir.path().join("node_modules/kit");
        fs::create_dir_all(pkg.join("src")).unwrap();
        fs::write(pkg.join("package.json"), r#"{ "name": "kit", "main": "src/index.ts" }"#).unwrap();
        fs::write(pkg.join("tsconfig.json"), r#"{ "compilerOptions": { "baseUrl": "src" } }"#).unwrap();
        fs::write(pkg.join("src/index.ts"), "").unwrap();

        let resolved = ModuleResolver::new().resolve("kit", &entry).unwrap();
        assert_eq!(resolved.base_url, Some(pkg.join("src")));
    }

    #[test]
    fn test_unmet_export_condition() {
        let (temp_dir, entry) = create_test_project();
        let pkg = temp_dir.path().join("node_modules/server-only");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("package.json"),
            r#"{ "name": "server-only", "exports": { ".": { "node": "./index.js" } } }"#,
        )
        .unwrap();

        let result = ModuleResolver::new().resolve("server-only", &entry);
        assert!(matches!(result, Err(ResolveError::Export { .. })));
    }
}
